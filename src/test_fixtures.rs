// Test fixtures: small L5X exports shared by the unit tests

/// Baseline export of controller C1
pub const PLANT_V1: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<RSLogix5000Content SchemaRevision="1.0" SoftwareRevision="32.00" TargetName="C1" TargetType="Controller" ContainsContext="false" ExportDate="Mon Jan 06 10:00:00 2025">
<Controller Use="Target" Name="C1" ProcessorType="1756-L83E" MajorRev="32" MinorRev="11">
<Description><![CDATA[Tank farm controller]]></Description>
<SafetyInfo SafetyLocked="false" SignatureRunModeProtect="false"/>
<DataTypes/>
<AddOnInstructionDefinitions>
<AddOnInstructionDefinition Name="Valve" Revision="1.2">
<Parameters>
<Parameter Name="Open" DataType="BOOL" Usage="Input" Required="true"/>
<Parameter Name="Opened" DataType="BOOL" Usage="Output"/>
<Parameter Name="Cmd" DataType="DINT" Usage="InOut"/>
</Parameters>
<LocalTags><LocalTag Name="Timer" DataType="TIMER"/></LocalTags>
</AddOnInstructionDefinition>
</AddOnInstructionDefinitions>
<Tags>
<Tag Name="Run" TagType="Base" DataType="BOOL"><Data Format="Decorated"><DataValue DataType="BOOL" Radix="Decimal" Value="0"/></Data></Tag>
<Tag Name="Pump" TagType="Base" DataType="BOOL"/>
</Tags>
<Programs>
<Program Name="Main" Type="Normal" MainRoutineName="MainRoutine" Disabled="false">
<Tags>
<Tag Name="Temp1" TagType="Base" DataType="REAL"><Description><![CDATA[Tank temperature]]></Description><Data><Value>21.5</Value></Data></Tag>
</Tags>
<Routines>
<Routine Name="MainRoutine" Type="RLL"><RLLContent><Rung Number="0" Type="N"><Text><![CDATA[XIC(Run)OTE(Pump);]]></Text></Rung></RLLContent></Routine>
<Routine Name="Calc" Type="ST"><STContent><Line Number="0"><![CDATA[Temp1 := Temp1 + 1.0;]]></Line></STContent></Routine>
</Routines>
</Program>
</Programs>
</Controller>
</RSLogix5000Content>
"#;

/// Same content as `PLANT_V1`, re-exported: new export date, different
/// attribute order, indentation, CDATA vs. plain text
pub const PLANT_V1_REFORMATTED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<RSLogix5000Content ExportDate="Tue Jan 07 08:30:00 2025" SchemaRevision="1.0" SoftwareRevision="32.00" TargetType="Controller" TargetName="C1" ContainsContext="false">
  <Controller MinorRev="11" MajorRev="32" ProcessorType="1756-L83E" Name="C1" Use="Target">
    <Description>Tank farm controller</Description>
    <SafetyInfo SignatureRunModeProtect="false" SafetyLocked="false" />
    <DataTypes></DataTypes>
    <AddOnInstructionDefinitions>
      <AddOnInstructionDefinition Revision="1.2" Name="Valve">
        <Parameters>
          <Parameter Usage="Input" DataType="BOOL" Name="Open" Required="true" />
          <Parameter Usage="Output" DataType="BOOL" Name="Opened" />
          <Parameter Usage="InOut" DataType="DINT" Name="Cmd" />
        </Parameters>
        <LocalTags>
          <LocalTag DataType="TIMER" Name="Timer" />
        </LocalTags>
      </AddOnInstructionDefinition>
    </AddOnInstructionDefinitions>
    <Programs>
      <Program Disabled="false" MainRoutineName="MainRoutine" Type="Normal" Name="Main">
        <Routines>
          <Routine Type="ST" Name="Calc">
            <STContent>
              <Line Number="0"><![CDATA[Temp1 := Temp1 + 1.0;]]></Line>
            </STContent>
          </Routine>
          <Routine Type="RLL" Name="MainRoutine">
            <RLLContent>
              <Rung Type="N" Number="0">
                <Text>XIC(Run)OTE(Pump);</Text>
              </Rung>
            </RLLContent>
          </Routine>
        </Routines>
        <Tags>
          <Tag DataType="REAL" TagType="Base" Name="Temp1">
            <Description>  Tank temperature  </Description>
            <Data>
              <Value>21.5</Value>
            </Data>
          </Tag>
        </Tags>
      </Program>
    </Programs>
    <Tags>
      <Tag DataType="BOOL" TagType="Base" Name="Pump" />
      <Tag DataType="BOOL" TagType="Base" Name="Run">
        <Data Format="Decorated">
          <DataValue Value="0" Radix="Decimal" DataType="BOOL" />
        </Data>
      </Tag>
    </Tags>
  </Controller>
</RSLogix5000Content>
"#;

/// `PLANT_V1` with Temp1 retyped (updated), Pump dropped (removed) and Level added (created)
pub const PLANT_V2: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<RSLogix5000Content SchemaRevision="1.0" SoftwareRevision="32.00" TargetName="C1" TargetType="Controller" ContainsContext="false" ExportDate="Mon Feb 03 09:15:00 2025">
<Controller Use="Target" Name="C1" ProcessorType="1756-L83E" MajorRev="32" MinorRev="11">
<Description><![CDATA[Tank farm controller]]></Description>
<SafetyInfo SafetyLocked="false" SignatureRunModeProtect="false"/>
<DataTypes/>
<AddOnInstructionDefinitions>
<AddOnInstructionDefinition Name="Valve" Revision="1.2">
<Parameters>
<Parameter Name="Open" DataType="BOOL" Usage="Input" Required="true"/>
<Parameter Name="Opened" DataType="BOOL" Usage="Output"/>
<Parameter Name="Cmd" DataType="DINT" Usage="InOut"/>
</Parameters>
<LocalTags><LocalTag Name="Timer" DataType="TIMER"/></LocalTags>
</AddOnInstructionDefinition>
</AddOnInstructionDefinitions>
<Tags>
<Tag Name="Run" TagType="Base" DataType="BOOL"><Data Format="Decorated"><DataValue DataType="BOOL" Radix="Decimal" Value="0"/></Data></Tag>
<Tag Name="Level" TagType="Base" DataType="REAL"/>
</Tags>
<Programs>
<Program Name="Main" Type="Normal" MainRoutineName="MainRoutine" Disabled="false">
<Tags>
<Tag Name="Temp1" TagType="Base" DataType="LREAL"><Description><![CDATA[Tank temperature]]></Description><Data><Value>21.5</Value></Data></Tag>
</Tags>
<Routines>
<Routine Name="MainRoutine" Type="RLL"><RLLContent><Rung Number="0" Type="N"><Text><![CDATA[XIC(Run)OTE(Pump);]]></Text></Rung></RLLContent></Routine>
<Routine Name="Calc" Type="ST"><STContent><Line Number="0"><![CDATA[Temp1 := Temp1 + 1.0;]]></Line></STContent></Routine>
</Routines>
</Program>
</Programs>
</Controller>
</RSLogix5000Content>
"#;

/// Two Temp1 tags in the same program scope
pub const DUPLICATE_TAG: &str = r#"<RSLogix5000Content SchemaRevision="1.0">
<Controller Name="C1">
<Programs>
<Program Name="Main">
<Tags>
<Tag Name="Temp1" DataType="REAL"/>
<Tag Name="Temp1" DataType="DINT"/>
</Tags>
</Program>
</Programs>
</Controller>
</RSLogix5000Content>
"#;

/// A second controller, for cross-controller isolation
pub const OTHER_CONTROLLER: &str = r#"<RSLogix5000Content SchemaRevision="1.0" ExportDate="Mon Jan 06 11:00:00 2025">
<Controller Name="C2">
<Tags><Tag Name="Flow" DataType="REAL"/></Tags>
</Controller>
</RSLogix5000Content>
"#;
