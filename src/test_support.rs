//! Call export fixtures shared by unit tests.

/// A complete export touching every group; maps to 18 rows.
pub fn full_call_export_xml() -> String {
    r#"<?xml version="1.0" encoding="utf-8"?>
<CallExport xmlns="urn:cad:call-export:v1" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <CallId>42</CallId>
  <CallNumber>591</CallNumber>
  <CallSource>911</CallSource>
  <CallerName>Jane Roe</CallerName>
  <CallerPhone></CallerPhone>
  <NatureOfCall>Chest Pain</NatureOfCall>
  <CreateDateTime>2024-01-26T10:00:00Z</CreateDateTime>
  <CloseDateTime>01/26/2024 11:45:00 AM</CloseDateTime>
  <CreatedBy>dispatch01</CreatedBy>
  <IsClosed>TRUE</IsClosed>
  <IsCanceled>0</IsCanceled>
  <AlarmLevel xsi:nil="true"/>
  <EmdCode>10-D-1</EmdCode>
  <AgencyContexts>
    <AgencyContext>
      <AgencyType>EMS</AgencyType>
      <CallType>MEDICAL</CallType>
      <Priority>1</Priority>
      <Status>Closed</Status>
      <Dispatcher>dispatch01</Dispatcher>
      <CreatedDateTime>2024-01-26T10:00:05Z</CreatedDateTime>
      <ClosedDateTime>2024-01-26T11:45:00Z</ClosedDateTime>
    </AgencyContext>
    <AgencyContext>
      <AgencyType>Fire</AgencyType>
      <CallType>ASSIST</CallType>
      <Priority>2</Priority>
      <Status>Closed</Status>
      <Dispatcher>dispatch02</Dispatcher>
      <CreatedDateTime>2024-01-26 10:01:00</CreatedDateTime>
      <ClosedDateTime></ClosedDateTime>
    </AgencyContext>
  </AgencyContexts>
  <Location>
    <FullAddress>100 Main St, Springfield</FullAddress>
    <HouseNumber>100</HouseNumber>
    <StreetName>Main St</StreetName>
    <City>Springfield</City>
    <State>IL</State>
    <PostalCode>62701</PostalCode>
    <CommonName>City Hall</CommonName>
    <CrossStreet>1st Ave</CrossStreet>
    <Latitude>39.7990</Latitude>
    <Longitude>-89.6440</Longitude>
    <PoliceBeat>B4</PoliceBeat>
    <FireZone>FZ2</FireZone>
    <EmsDistrict>E1</EmsDistrict>
  </Location>
  <Incidents>
    <Incident>
      <IncidentNumber>2024-000123</IncidentNumber>
      <CaseNumber>C-77</CaseNumber>
      <Jurisdiction>SPFD</Jurisdiction>
      <AgencyType>EMS</AgencyType>
      <IncidentType>MEDICAL</IncidentType>
      <CreateDateTime>2024-01-26T10:02:00-06:00</CreateDateTime>
    </Incident>
  </Incidents>
  <AssignedUnits>
    <Unit>
      <UnitNumber>Medic 7</UnitNumber>
      <UnitType>ALS</UnitType>
      <AgencyType>EMS</AgencyType>
      <Jurisdiction>SPFD</Jurisdiction>
      <IsPrimary>yes</IsPrimary>
      <AssignedDateTime>2024-01-26T10:01:00Z</AssignedDateTime>
      <DispatchDateTime>2024-01-26T10:01:30Z</DispatchDateTime>
      <EnrouteDateTime>2024-01-26T10:02:00Z</EnrouteDateTime>
      <ArriveDateTime>2024-01-26T10:09:00Z</ArriveDateTime>
      <StagedDateTime></StagedDateTime>
      <AtPatientDateTime>2024-01-26T10:10:00Z</AtPatientDateTime>
      <TransportDateTime>2024-01-26T10:25:00Z</TransportDateTime>
      <AtHospitalDateTime>2024-01-26T10:40:00Z</AtHospitalDateTime>
      <DepartHospitalDateTime>2024-01-26T11:20:00Z</DepartHospitalDateTime>
      <ClearDateTime>2024-01-26T11:30:00Z</ClearDateTime>
      <TransportMileage>7.4</TransportMileage>
      <Personnel>
        <Person>
          <EmployeeId>E100</EmployeeId>
          <FirstName>Sam</FirstName>
          <LastName>Lee</LastName>
          <Rank>Paramedic</Rank>
          <IsPrimaryOfficer>true</IsPrimaryOfficer>
        </Person>
        <Person>
          <EmployeeId>E101</EmployeeId>
          <FirstName>Alex</FirstName>
          <LastName>Kim</LastName>
          <Rank>EMT</Rank>
          <IsPrimaryOfficer>false</IsPrimaryOfficer>
        </Person>
      </Personnel>
      <UnitLogs>
        <Log>
          <LogDateTime>2024-01-26T10:01:30Z</LogDateTime>
          <Status>Dispatched</Status>
          <Location>Station 7</Location>
          <Comment></Comment>
        </Log>
        <Log>
          <LogDateTime>2024-01-26T10:02:00Z</LogDateTime>
          <Status>Enroute</Status>
          <Location>Station 7</Location>
          <Comment>lights and sirens</Comment>
        </Log>
        <Log>
          <LogDateTime>2024-01-26T10:09:00Z</LogDateTime>
          <Status>Arrived</Status>
          <Location>100 Main St</Location>
          <Comment/>
        </Log>
      </UnitLogs>
      <Dispositions>
        <Disposition>
          <Code>TX</Code>
          <Description>Transported</Description>
          <Count>1</Count>
          <DispositionDateTime>2024-01-26T10:25:00Z</DispositionDateTime>
        </Disposition>
      </Dispositions>
    </Unit>
    <Unit>
      <UnitNumber>Engine 3</UnitNumber>
      <UnitType>ENGINE</UnitType>
      <AgencyType>Fire</AgencyType>
      <Jurisdiction>SPFD</Jurisdiction>
      <IsPrimary>no</IsPrimary>
      <AssignedDateTime>2024-01-26T10:01:10Z</AssignedDateTime>
      <ClearDateTime>2024-01-26T10:30:00Z</ClearDateTime>
      <TransportMileage>nil</TransportMileage>
    </Unit>
  </AssignedUnits>
  <Narratives>
    <Narrative>
      <NarrativeType>Call</NarrativeType>
      <Text>Caller reports male, 60s, chest pain.</Text>
      <EnteredBy>dispatch01</EnteredBy>
      <EnteredDateTime>2024-01-26T10:00:30Z</EnteredDateTime>
    </Narrative>
    <Narrative>
      <NarrativeType>Unit</NarrativeType>
      <Text><![CDATA[Pt conscious & alert]]></Text>
      <EnteredBy>Medic 7</EnteredBy>
      <EnteredDateTime>not-a-date</EnteredDateTime>
    </Narrative>
  </Narratives>
  <Persons>
    <Person>
      <Role>Patient</Role>
      <FirstName>John</FirstName>
      <MiddleName></MiddleName>
      <LastName>Doe</LastName>
      <DateOfBirth>1960-05-04</DateOfBirth>
      <Race>W</Race>
      <Sex>M</Sex>
      <Phone>555-0100</Phone>
      <Address>100 Main St</Address>
    </Person>
  </Persons>
  <Vehicles>
    <Vehicle>
      <Role>Involved</Role>
      <Make>Ford</Make>
      <Model>F-150</Model>
      <Year>nil</Year>
      <Color>Blue</Color>
      <LicensePlate>ABC123</LicensePlate>
      <LicenseState>IL</LicenseState>
      <Vin>1FTFW1E50PFA00000</Vin>
    </Vehicle>
  </Vehicles>
  <Dispositions>
    <Disposition>
      <Code>CLR</Code>
      <Description>Cleared</Description>
      <Count>2</Count>
      <DispositionDateTime>2024-01-26T11:45:00Z</DispositionDateTime>
    </Disposition>
  </Dispositions>
</CallExport>
"#
    .to_string()
}

/// A minimal export for `call_id` with the given units, one narrative and one person.
pub fn call_export_xml(call_id: &str, unit_numbers: &[&str]) -> String {
    let units = unit_numbers
        .iter()
        .map(|unit_number| {
            format!(
                "    <Unit>\n      <UnitNumber>{unit_number}</UnitNumber>\n      <DispatchDateTime>2024-01-26T10:01:00Z</DispatchDateTime>\n    </Unit>\n"
            )
        })
        .collect::<String>();

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<CallExport xmlns="urn:cad:call-export:v1">
  <CallId>{call_id}</CallId>
  <CallNumber>{call_id}</CallNumber>
  <NatureOfCall>Structure Fire</NatureOfCall>
  <CreateDateTime>2024-01-26T10:00:00Z</CreateDateTime>
  <AssignedUnits>
{units}  </AssignedUnits>
  <Narratives>
    <Narrative>
      <Text>units assigned: {count}</Text>
    </Narrative>
  </Narratives>
  <Persons>
    <Person>
      <Role>Reporting Party</Role>
      <LastName>Roe</LastName>
    </Person>
  </Persons>
</CallExport>
"#,
        count = unit_numbers.len()
    )
}
