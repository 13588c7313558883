/*!
    axis status word reported by the FASTECH drive

    the drive answers a status request with a 32 bit little endian flag word, each bit being one of the `FFLAG_*` flags of the Ezi-STEP documentation.
*/

use bilge::prelude::*;
use crate::pack_bilge;


/// 32 bit flag word of the axis, least significant bit first
#[bitsize(32)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq, DefaultBits)]
pub struct AxisStatus {
    /// any error is active, the drive refuses motion until an alarm reset
    pub error_all: bool,
    pub hw_positive_limit: bool,
    pub hw_negative_limit: bool,
    pub sw_positive_limit: bool,
    pub sw_negative_limit: bool,
    _reserved: u4,
    pub overspeed: bool,
    pub position_tracking: bool,
    pub overload: bool,
    pub overheat: bool,
    pub back_emf: bool,
    /// motor supply missing or too low
    pub motor_power: bool,
    pub in_position_error: bool,
    pub emergency_stop: bool,
    pub slow_stop: bool,
    /// homing sequence in progress
    pub origin_returning: bool,
    pub in_position: bool,
    pub servo_on: bool,
    pub alarm_reset: bool,
    /// pulse train stopped, the normal flag of a motor at rest
    pub pt_stopped: bool,
    pub origin_sensor: bool,
    pub z_pulse: bool,
    pub origin_return_ok: bool,
    /// set when moving forward
    pub motion_direction: bool,
    /// the axis is currently moving
    pub motioning: bool,
    pub motion_pause: bool,
    pub motion_accel: bool,
    pub motion_decel: bool,
    pub motion_const: bool,
}
pack_bilge!(AxisStatus);

impl AxisStatus {
    /// bit index of [Self::error_all]
    pub const ERROR_ALL: u32 = 0;
    /// bit index of [Self::motor_power]
    pub const MOTOR_POWER_ERROR: u32 = 14;
    /// bit index of [Self::pt_stopped]
    pub const PT_STOPPED: u32 = 22;
    /// bit index of [Self::motioning]
    pub const MOTIONING: u32 = 27;

    /// raw flag word
    pub fn bits(self) -> u32 {
        u32::from(self)
    }
    /// an alarm is latched in the drive
    pub fn alarm(self) -> bool {
        self.error_all()
    }
    /// the axis is standing still
    pub fn stopped(self) -> bool {
        !self.motioning()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use packbytes::{FromBytes, ToBytes};

    #[test]
    fn bit_positions() {
        let status = AxisStatus::from(1u32 << AxisStatus::MOTIONING);
        assert!(status.motioning());
        assert!(!status.pt_stopped());
        assert!(!status.alarm());

        let status = AxisStatus::from(1u32 << AxisStatus::PT_STOPPED);
        assert!(status.pt_stopped());
        assert!(status.stopped());

        let status = AxisStatus::from(1u32 << AxisStatus::MOTOR_POWER_ERROR);
        assert!(status.motor_power());
        // the drive raises error_all along with any error flag
        assert!(!status.alarm());

        let status = AxisStatus::from(1u32 << AxisStatus::ERROR_ALL);
        assert!(status.error_all());
        assert!(status.alarm());

        assert!(AxisStatus::from(0x0010_0000).servo_on());
        assert!(AxisStatus::from(0x0200_0000).origin_return_ok());
        assert!(AxisStatus::from(0x8000_0000).motion_const());
    }

    #[test]
    fn wire_order() {
        let status = AxisStatus::from_le_bytes([0x01, 0x00, 0x40, 0x08]);
        assert_eq!(status.bits(), 0x0840_0001);
        assert!(status.error_all());
        assert!(status.pt_stopped());
        assert!(status.motioning());
        assert_eq!(status.to_le_bytes(), [0x01, 0x00, 0x40, 0x08]);
    }
}
