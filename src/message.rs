//! The OpenTherm data-id catalog.
//!
//! [`MessageId`] enumerates the data-ids defined by the OpenTherm protocol
//! (v4.2), from `STATUS` through the ventilation/heat-recovery and solar
//! storage ranges up to the product version ids. Each id carries a default
//! [`ValueKind`] telling how its two data bytes are interpreted when a
//! response is published to a sink.

use core::fmt;

use thiserror::Error;

use crate::frame::Frame;

/// How the two data bytes of a frame are to be interpreted.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum ValueKind {
    /// Two 8-bit flag vectors.
    Flags,
    /// Two unsigned bytes.
    U8,
    /// Two signed bytes.
    S8,
    /// One unsigned 16-bit integer.
    U16,
    /// One signed 16-bit integer.
    S16,
    /// Signed 8.8 fixed point.
    F88,
}

/// A decoded data value.
#[derive(PartialEq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Value {
    /// Flag vectors of the high and low byte.
    Flags {
        /// High byte flags.
        hb: u8,
        /// Low byte flags.
        lb: u8,
    },
    /// Unsigned high and low byte.
    U8 {
        /// High byte.
        hb: u8,
        /// Low byte.
        lb: u8,
    },
    /// Signed high and low byte.
    S8 {
        /// High byte.
        hb: i8,
        /// Low byte.
        lb: i8,
    },
    /// Unsigned 16-bit integer.
    U16(u16),
    /// Signed 16-bit integer.
    S16(i16),
    /// 8.8 fixed point, as a float.
    F88(f32),
}

impl Value {
    /// Reads the data bytes of `frame` as `kind`.
    pub fn decode(frame: &Frame, kind: ValueKind) -> Self {
        match kind {
            ValueKind::Flags => Value::Flags {
                hb: frame.value_hb,
                lb: frame.value_lb,
            },
            ValueKind::U8 => Value::U8 {
                hb: frame.value_hb,
                lb: frame.value_lb,
            },
            ValueKind::S8 => Value::S8 {
                hb: frame.s8_hb(),
                lb: frame.s8_lb(),
            },
            ValueKind::U16 => Value::U16(frame.u16()),
            ValueKind::S16 => Value::S16(frame.s16()),
            ValueKind::F88 => Value::F88(frame.f88()),
        }
    }

    /// Writes the value into the data bytes of `frame`.
    pub fn encode_into(self, frame: &mut Frame) {
        match self {
            Value::Flags { hb, lb } | Value::U8 { hb, lb } => {
                frame.value_hb = hb;
                frame.value_lb = lb;
            }
            Value::S8 { hb, lb } => {
                frame.value_hb = hb as u8;
                frame.value_lb = lb as u8;
            }
            Value::U16(v) => frame.set_u16(v),
            Value::S16(v) => frame.set_s16(v),
            Value::F88(v) => frame.set_f88(v),
        }
    }

    /// The interpretation this value was decoded with.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Flags { .. } => ValueKind::Flags,
            Value::U8 { .. } => ValueKind::U8,
            Value::S8 { .. } => ValueKind::S8,
            Value::U16(_) => ValueKind::U16,
            Value::S16(_) => ValueKind::S16,
            Value::F88(_) => ValueKind::F88,
        }
    }
}

/// The error returned when a byte is not a known data-id.
#[derive(Error, PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[error("unknown OpenTherm data-id {0}")]
pub struct UnknownMessageId(pub u8);

macro_rules! catalog {
    ( $( $variant:ident = $id:literal, $name:literal, $kind:ident, $doc:literal; )* ) => {
        /// An OpenTherm data-id.
        #[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug)]
        #[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
        #[repr(u8)]
        pub enum MessageId {
            $(
                #[doc = $doc]
                $variant = $id,
            )*
        }

        impl MessageId {
            /// Every catalog entry, in ascending id order.
            pub const ALL: &'static [MessageId] = &[ $( MessageId::$variant, )* ];

            /// Protocol name of the data-id, for logs.
            pub fn name(self) -> &'static str {
                match self {
                    $( MessageId::$variant => $name, )*
                }
            }

            /// Default interpretation of the data bytes of this id.
            pub fn value_kind(self) -> ValueKind {
                match self {
                    $( MessageId::$variant => ValueKind::$kind, )*
                }
            }
        }

        impl TryFrom<u8> for MessageId {
            type Error = UnknownMessageId;

            fn try_from(id: u8) -> Result<Self, Self::Error> {
                match id {
                    $( $id => Ok(MessageId::$variant), )*
                    other => Err(UnknownMessageId(other)),
                }
            }
        }
    };
}

catalog! {
    Status = 0, "STATUS", Flags, "Master and slave status flags.";
    ChSetpoint = 1, "CH_SETPOINT", F88, "Central heating water temperature setpoint (°C).";
    ControllerConfig = 2, "CONTROLLER_CONFIG", Flags, "Master configuration flags and member id.";
    DeviceConfig = 3, "DEVICE_CONFIG", Flags, "Slave configuration flags and member id.";
    CommandCode = 4, "COMMAND_CODE", U8, "Remote command and its response code.";
    FaultFlags = 5, "FAULT_FLAGS", Flags, "Application-specific fault flags and OEM fault code.";
    Remote = 6, "REMOTE", Flags, "Remote parameter transfer-enable and read/write flags.";
    CoolingControl = 7, "COOLING_CONTROL", F88, "Cooling control signal (%).";
    Ch2Setpoint = 8, "CH2_SETPOINT", F88, "Second heating circuit water temperature setpoint (°C).";
    ChSetpointOverride = 9, "CH_SETPOINT_OVERRIDE", F88, "Remote override room setpoint (°C).";
    TspCount = 10, "TSP_COUNT", U8, "Number of transparent slave parameters supported.";
    TspCommand = 11, "TSP_COMMAND", U8, "Index and value of a transparent slave parameter.";
    FhbSize = 12, "FHB_SIZE", U8, "Size of the fault history buffer.";
    FhbCommand = 13, "FHB_COMMAND", U8, "Index and value of a fault history buffer entry.";
    MaxModulationLevel = 14, "MAX_MODULATION_LEVEL", F88, "Maximum relative modulation level setting (%).";
    MaxBoilerCapacity = 15, "MAX_BOILER_CAPACITY", U8, "Maximum boiler capacity (kW) and minimum modulation level (%).";
    RoomSetpoint = 16, "ROOM_SETPOINT", F88, "Room setpoint (°C).";
    ModulationLevel = 17, "MODULATION_LEVEL", F88, "Relative modulation level (%).";
    ChWaterPressure = 18, "CH_WATER_PRESSURE", F88, "Water pressure in the central heating circuit (bar).";
    DhwFlowRate = 19, "DHW_FLOW_RATE", F88, "Water flow rate in the domestic hot water circuit (l/min).";
    DayTime = 20, "DAY_TIME", U8, "Day of week and time of day.";
    Date = 21, "DATE", U8, "Calendar month and day of month.";
    Year = 22, "YEAR", U16, "Calendar year.";
    RoomSetpointCh2 = 23, "ROOM_SETPOINT_CH2", F88, "Room setpoint of the second heating circuit (°C).";
    RoomTemp = 24, "ROOM_TEMP", F88, "Room temperature (°C).";
    FeedTemp = 25, "FEED_TEMP", F88, "Boiler flow water temperature (°C).";
    DhwTemp = 26, "DHW_TEMP", F88, "Domestic hot water temperature (°C).";
    OutsideTemp = 27, "OUTSIDE_TEMP", F88, "Outside temperature (°C).";
    ReturnWaterTemp = 28, "RETURN_WATER_TEMP", F88, "Return water temperature (°C).";
    SolarStoreTemp = 29, "SOLAR_STORE_TEMP", F88, "Solar storage temperature (°C).";
    SolarCollectTemp = 30, "SOLAR_COLLECT_TEMP", F88, "Solar collector temperature (°C).";
    FeedTempCh2 = 31, "FEED_TEMP_CH2", F88, "Flow water temperature of the second heating circuit (°C).";
    Dhw2Temp = 32, "DHW2_TEMP", F88, "Second domestic hot water temperature (°C).";
    ExhaustTemp = 33, "EXHAUST_TEMP", S16, "Boiler exhaust temperature (°C).";
    FanSpeed = 35, "FAN_SPEED", U16, "Boiler fan speed setpoint and actual value.";
    FlameCurrent = 36, "FLAME_CURRENT", F88, "Electrical current through the burner flame (µA).";
    RoomTempCh2 = 37, "ROOM_TEMP_CH2", F88, "Room temperature of the second heating circuit (°C).";
    RelHumidity = 38, "REL_HUMIDITY", F88, "Relative humidity (%).";
    DhwBounds = 48, "DHW_BOUNDS", S8, "Upper and lower bound of the DHW setpoint (°C).";
    ChBounds = 49, "CH_BOUNDS", S8, "Upper and lower bound of the max CH setpoint (°C).";
    OtcCurveBounds = 50, "OTC_CURVE_BOUNDS", S8, "Upper and lower bound of the OTC heat curve ratio.";
    DhwSetpoint = 56, "DHW_SETPOINT", F88, "Domestic hot water temperature setpoint (°C).";
    MaxChSetpoint = 57, "MAX_CH_SETPOINT", F88, "Maximum allowable CH water setpoint (°C).";
    OtcCurveRatio = 58, "OTC_CURVE_RATIO", F88, "OTC heat curve ratio.";
    HvacStatus = 70, "HVAC_STATUS", Flags, "Ventilation/heat-recovery status flags.";
    RelVentSetpoint = 71, "REL_VENT_SETPOINT", U8, "Relative ventilation position setpoint (%).";
    DeviceVent = 74, "DEVICE_VENT", Flags, "Ventilation/heat-recovery configuration and member id.";
    HvacVerId = 75, "HVAC_VER_ID", U8, "OpenTherm version of the ventilation/heat-recovery unit.";
    RelVentilation = 77, "REL_VENTILATION", U8, "Relative ventilation (%).";
    RelHumidExhaust = 78, "REL_HUMID_EXHAUST", U8, "Relative humidity of the exhaust air (%).";
    ExhaustCo2 = 79, "EXHAUST_CO2", U16, "CO2 level of the exhaust air (ppm).";
    SupplyInletTemp = 80, "SUPPLY_INLET_TEMP", F88, "Supply inlet temperature (°C).";
    SupplyOutletTemp = 81, "SUPPLY_OUTLET_TEMP", F88, "Supply outlet temperature (°C).";
    ExhaustInletTemp = 82, "EXHAUST_INLET_TEMP", F88, "Exhaust inlet temperature (°C).";
    ExhaustOutletTemp = 83, "EXHAUST_OUTLET_TEMP", F88, "Exhaust outlet temperature (°C).";
    ExhaustFanSpeed = 84, "EXHAUST_FAN_SPEED", U16, "Actual exhaust fan speed (rpm).";
    SupplyFanSpeed = 85, "SUPPLY_FAN_SPEED", U16, "Actual supply fan speed (rpm).";
    RemoteVentilationParam = 86, "REMOTE_VENTILATION_PARAM", Flags, "Ventilation remote parameter flags.";
    NomRelVentilation = 87, "NOM_REL_VENTILATION", U8, "Nominal relative ventilation value (%).";
    HvacNumTsp = 88, "HVAC_NUM_TSP", U8, "Number of ventilation transparent slave parameters.";
    HvacIdxTsp = 89, "HVAC_IDX_TSP", U8, "Index and value of a ventilation transparent slave parameter.";
    HvacFhbSize = 90, "HVAC_FHB_SIZE", U8, "Size of the ventilation fault history buffer.";
    HvacFhbIdx = 91, "HVAC_FHB_IDX", U8, "Index and value of a ventilation fault history entry.";
    RfSignal = 98, "RF_SIGNAL", U8, "RF sensor type and signal strength.";
    DhwMode = 99, "DHW_MODE", U8, "Operating mode of the heating circuits and DHW.";
    OverrideFunc = 100, "OVERRIDE_FUNC", Flags, "Remote override function flags.";
    SolarModeFlags = 101, "SOLAR_MODE_FLAGS", Flags, "Solar storage mode and status flags.";
    SolarAsf = 102, "SOLAR_ASF", Flags, "Solar storage fault flags and OEM fault code.";
    SolarVersionId = 103, "SOLAR_VERSION_ID", U8, "Solar storage configuration and member id.";
    SolarProductId = 104, "SOLAR_PRODUCT_ID", U8, "Solar storage product version.";
    SolarNumTsp = 105, "SOLAR_NUM_TSP", U8, "Number of solar storage transparent slave parameters.";
    SolarIdxTsp = 106, "SOLAR_IDX_TSP", U8, "Index and value of a solar storage transparent slave parameter.";
    SolarFhbSize = 107, "SOLAR_FHB_SIZE", U8, "Size of the solar storage fault history buffer.";
    SolarFhbIdx = 108, "SOLAR_FHB_IDX", U8, "Index and value of a solar storage fault history entry.";
    SolarStarts = 109, "SOLAR_STARTS", U16, "Electricity producer starts.";
    SolarHours = 110, "SOLAR_HOURS", U16, "Electricity producer operating hours.";
    SolarEnergy = 111, "SOLAR_ENERGY", U16, "Electricity production (W).";
    SolarTotalEnergy = 112, "SOLAR_TOTAL_ENERGY", U16, "Cumulative electricity production (kWh).";
    FailedBurnerStarts = 113, "FAILED_BURNER_STARTS", U16, "Unsuccessful burner starts.";
    BurnerFlameLow = 114, "BURNER_FLAME_LOW", U16, "Times the flame signal was too low.";
    OemDiagnostic = 115, "OEM_DIAGNOSTIC", U16, "OEM-specific diagnostic code.";
    BurnerStarts = 116, "BURNER_STARTS", U16, "Successful burner starts.";
    ChPumpStarts = 117, "CH_PUMP_STARTS", U16, "CH pump starts.";
    DhwPumpStarts = 118, "DHW_PUMP_STARTS", U16, "DHW pump/valve starts.";
    DhwBurnerStarts = 119, "DHW_BURNER_STARTS", U16, "Burner starts in DHW mode.";
    BurnerHours = 120, "BURNER_HOURS", U16, "Burner operating hours.";
    ChPumpHours = 121, "CH_PUMP_HOURS", U16, "CH pump operating hours.";
    DhwPumpHours = 122, "DHW_PUMP_HOURS", U16, "DHW pump/valve operating hours.";
    DhwBurnerHours = 123, "DHW_BURNER_HOURS", U16, "Burner operating hours in DHW mode.";
    OtVersionController = 124, "OT_VERSION_CONTROLLER", F88, "OpenTherm protocol version of the master.";
    OtVersionDevice = 125, "OT_VERSION_DEVICE", F88, "OpenTherm protocol version of the slave.";
    VersionController = 126, "VERSION_CONTROLLER", U8, "Master product type and version.";
    VersionDevice = 127, "VERSION_DEVICE", U8, "Slave product type and version.";
}

impl From<MessageId> for u8 {
    fn from(id: MessageId) -> Self {
        id as u8
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::MessageType;

    #[test]
    fn test_catalog_round_trips_ids() {
        for &id in MessageId::ALL {
            assert_eq!(MessageId::try_from(u8::from(id)), Ok(id));
        }
        assert_eq!(MessageId::ALL.len(), 93);
    }

    #[test]
    fn test_catalog_is_sorted_and_unique() {
        for pair in MessageId::ALL.windows(2) {
            assert!(u8::from(pair[0]) < u8::from(pair[1]));
        }
    }

    #[test]
    fn test_unknown_ids_are_rejected() {
        assert_eq!(MessageId::try_from(34), Err(UnknownMessageId(34)));
        assert_eq!(MessageId::try_from(200), Err(UnknownMessageId(200)));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_unknown_id_message() {
        let err = MessageId::try_from(34).unwrap_err();
        assert_eq!(err.to_string(), "unknown OpenTherm data-id 34");
        let source: &dyn core::error::Error = &err;
        assert!(source.source().is_none());
    }

    #[test]
    fn test_names_and_kinds() {
        assert_eq!(MessageId::Status.name(), "STATUS");
        assert_eq!(MessageId::FeedTemp.value_kind(), ValueKind::F88);
        assert_eq!(MessageId::BurnerStarts.value_kind(), ValueKind::U16);
        assert_eq!(MessageId::ExhaustTemp.value_kind(), ValueKind::S16);
    }

    #[test]
    fn test_value_decoding_follows_kind() {
        let mut frame = Frame::new(MessageType::ReadAck, MessageId::FeedTemp);
        frame.set_f88(45.5);
        assert_eq!(
            Value::decode(&frame, MessageId::FeedTemp.value_kind()),
            Value::F88(45.5)
        );

        let frame = Frame {
            value_hb: 70,
            value_lb: 0xE2,
            ..Frame::new(MessageType::ReadAck, MessageId::DhwBounds)
        };
        assert_eq!(
            Value::decode(&frame, ValueKind::S8),
            Value::S8 { hb: 70, lb: -30 }
        );
    }

    #[test]
    fn test_value_encoding() {
        let mut frame = Frame::new(MessageType::WriteData, MessageId::ChSetpoint);
        Value::F88(60.0).encode_into(&mut frame);
        assert_eq!(frame.u16(), 60 * 256);

        Value::S8 { hb: -1, lb: 2 }.encode_into(&mut frame);
        assert_eq!((frame.value_hb, frame.value_lb), (0xFF, 2));
        assert_eq!(Value::U16(7).kind(), ValueKind::U16);
    }
}
