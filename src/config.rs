//! Scheduler configuration.
//!
//! [`HubConfig`] holds the static settings of a [`Scheduler`](crate::scheduler::Scheduler),
//! fixed when the firmware is built. [`StatusInputs`] supplies the runtime half of
//! the `STATUS` request: switches and setpoints that can change while running.
//!
//! Every bit of the `STATUS` master flags is the AND of the static setting
//! and its runtime input, so a boiler mode can be pinned off at build time or
//! toggled from the firmware's own UI.

/// Static configuration of the scheduler.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct HubConfig {
    /// Run whole conversations from [`run()`](crate::scheduler::Scheduler::run),
    /// spinning on the transceiver instead of returning between phases.
    ///
    /// Useful when other code on the main loop masks interrupts for long
    /// stretches and corrupts reception.
    pub sync_mode: bool,
    /// Static half of the `STATUS` master flags.
    pub status: StatusConfig,
}

/// Static enables of the seven `STATUS` master flags.
///
/// Central heating and hot water default to enabled, everything else to disabled.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct StatusConfig {
    /// Central heating (bit 0).
    pub ch_enable: bool,
    /// Domestic hot water (bit 1).
    pub dhw_enable: bool,
    /// Cooling (bit 2).
    pub cooling_enable: bool,
    /// Outside temperature compensation (bit 3).
    pub otc_active: bool,
    /// Second central heating circuit (bit 4).
    pub ch2_active: bool,
    /// Summer mode (bit 5).
    pub summer_mode_active: bool,
    /// Hot water blocking (bit 6).
    pub dhw_block: bool,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            ch_enable: true,
            dhw_enable: true,
            cooling_enable: false,
            otc_active: false,
            ch2_active: false,
            summer_mode_active: false,
            dhw_block: false,
        }
    }
}

/// Runtime inputs of the `STATUS` request.
///
/// Every switch defaults to on, so an implementation only overrides what it
/// actually controls. Setpoints default to `None`, which skips the
/// "setpoint above zero" condition of the matching flag.
pub trait StatusInputs {
    /// Central heating switch.
    fn ch_enable(&self) -> bool {
        true
    }
    /// Hot water switch.
    fn dhw_enable(&self) -> bool {
        true
    }
    /// Cooling switch.
    fn cooling_enable(&self) -> bool {
        true
    }
    /// Outside temperature compensation switch.
    fn otc_active(&self) -> bool {
        true
    }
    /// Second heating circuit switch.
    fn ch2_active(&self) -> bool {
        true
    }
    /// Summer mode switch.
    fn summer_mode_active(&self) -> bool {
        true
    }
    /// Hot water blocking switch.
    fn dhw_block(&self) -> bool {
        true
    }
    /// Central heating water setpoint in °C.
    fn t_set(&self) -> Option<f32> {
        None
    }
    /// Second circuit water setpoint in °C.
    fn t_set_ch2(&self) -> Option<f32> {
        None
    }
    /// Cooling control signal in %.
    fn cooling_control(&self) -> Option<f32> {
        None
    }
}

/// No runtime inputs: the static [`StatusConfig`] alone decides.
impl StatusInputs for () {}

impl StatusConfig {
    /// Computes the master status byte (high byte of the `STATUS` request).
    pub fn master_flags(&self, inputs: &dyn StatusInputs) -> u8 {
        let positive = |value: Option<f32>| value.is_none_or(|v| v > 0.0);

        let flags = [
            self.ch_enable && inputs.ch_enable() && positive(inputs.t_set()),
            self.dhw_enable && inputs.dhw_enable(),
            self.cooling_enable
                && inputs.cooling_enable()
                && positive(inputs.cooling_control()),
            self.otc_active && inputs.otc_active(),
            self.ch2_active && inputs.ch2_active() && positive(inputs.t_set_ch2()),
            self.summer_mode_active && inputs.summer_mode_active(),
            self.dhw_block && inputs.dhw_block(),
        ];
        flags
            .iter()
            .enumerate()
            .fold(0, |acc, (bit, &on)| acc | (u8::from(on) << bit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Setpoints {
        t_set: f32,
        dhw: bool,
    }

    impl StatusInputs for Setpoints {
        fn dhw_enable(&self) -> bool {
            self.dhw
        }
        fn t_set(&self) -> Option<f32> {
            Some(self.t_set)
        }
    }

    #[test]
    fn test_defaults() {
        let config = HubConfig::default();
        assert!(!config.sync_mode);
        assert_eq!(config.status.master_flags(&()), 0b0000_0011);
    }

    #[test]
    fn test_ch_needs_positive_setpoint() {
        let status = StatusConfig::default();
        let off = Setpoints {
            t_set: 0.0,
            dhw: true,
        };
        let on = Setpoints {
            t_set: 45.0,
            dhw: true,
        };
        assert_eq!(status.master_flags(&off), 0b10);
        assert_eq!(status.master_flags(&on), 0b11);
    }

    #[test]
    fn test_runtime_switch_masks_static_enable() {
        let status = StatusConfig::default();
        let inputs = Setpoints {
            t_set: 60.0,
            dhw: false,
        };
        assert_eq!(status.master_flags(&inputs), 0b01);
    }

    #[test]
    fn test_all_flags() {
        let status = StatusConfig {
            ch_enable: true,
            dhw_enable: true,
            cooling_enable: true,
            otc_active: true,
            ch2_active: true,
            summer_mode_active: true,
            dhw_block: true,
        };
        assert_eq!(status.master_flags(&()), 0b0111_1111);
    }
}
