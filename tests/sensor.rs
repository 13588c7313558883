mod common;

use ezibus::{
    modbus,
    registers,
    slave::Sensor,
    };
use common::*;


#[test]
fn measures() {
    sensor_test(Sensor::new(SENSOR_ID), |mut sensor, _device| async move {
        assert_eq!(sensor.last_readings(), (None, None));
        assert_eq!(sensor.read_temperature().await, Some(25.5));
        assert_eq!(sensor.read_humidity().await, Some(45.0));
        assert_eq!(sensor.last_readings(), (Some(25.5), Some(45.0)));
    });
}

#[test]
fn negative_temperature() {
    let device = Sensor::new(SENSOR_ID);
    device.set_measures(-125, 300);
    sensor_test(device, |mut sensor, _device| async move {
        assert_eq!(sensor.read_temperature().await, Some(-12.5));
    });
}

#[test]
fn out_of_limits_kept() {
    let device = Sensor::new(SENSOR_ID);
    device.set_measures(700, 950);
    sensor_test(device, |mut sensor, _device| async move {
        assert_eq!(sensor.read_temperature().await, Some(70.0));
        assert_eq!(sensor.read_humidity().await, Some(95.0));
        assert_eq!(sensor.last_readings(), (Some(70.0), Some(95.0)));
    });
}

#[test]
fn combined_reading() {
    sensor_test(Sensor::new(SENSOR_ID), |mut sensor, device| async move {
        assert_eq!(sensor.last_reading(), None);
        let reading = sensor.read_reading().await.unwrap();
        assert_eq!(reading.temperature_c, 25.5);
        assert_eq!(reading.humidity_pct, 45.0);
        assert_eq!(sensor.last_reading(), Some(reading));
        assert_eq!(sensor.last_readings(), (Some(25.5), Some(45.0)));

        // a single request for both registers
        let received = device.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0], modbus::Request::read(SENSOR_ID, modbus::READ_INPUT_REGISTERS, 0x0001, 2));
    });
}

#[test]
fn wrong_slave() {
    sensor_test(Sensor::new(SENSOR_ID + 1), |mut sensor, device| async move {
        assert_eq!(sensor.read_temperature().await, None);
        assert!(device.received().is_empty());
        assert_eq!(sensor.last_readings(), (None, None));
    });
}

#[test]
fn exception() {
    let device = Sensor::new(SENSOR_ID);
    device.state().registers.remove(&registers::HUMIDITY.address());
    sensor_test(device, |mut sensor, _device| async move {
        assert_eq!(sensor.read_humidity().await, None);
        assert!(matches!(
            sensor.try_read_registers(modbus::READ_INPUT_REGISTERS, registers::HUMIDITY.address(), 1).await,
            Err(ezibus::master::Error::Frame(ezibus::FrameError::Exception(0x02))),
            ));
        assert_eq!(sensor.read_reading().await, None);
        assert_eq!(sensor.read_temperature().await, Some(25.5));
    });
}

#[test]
fn invalid_requests() {
    sensor_test(Sensor::new(SENSOR_ID), |mut sensor, device| async move {
        assert!(sensor.try_read_registers(modbus::READ_INPUT_REGISTERS, 0x0001, 0).await.is_err());
        assert!(sensor.try_read_registers(modbus::READ_INPUT_REGISTERS, 0x0001, 126).await.is_err());
        assert!(sensor.try_read_registers(modbus::WRITE_SINGLE_REGISTER, 0x0001, 1).await.is_err());
        assert!(device.received().is_empty());
    });
}

#[test]
fn device_id() {
    sensor_test(Sensor::new(SENSOR_ID), |mut sensor, device| async move {
        assert_eq!(sensor.read_device_id().await, Some(SENSOR_ID));

        assert!(!sensor.change_device_id(0).await);
        assert!(!sensor.change_device_id(248).await);
        assert!(device.received().len() == 1);

        assert!(sensor.change_device_id(5).await);
        assert_eq!(sensor.config().slave_id, 5);
        assert_eq!(device.state().slave_id, 5);
        assert_eq!(sensor.read_device_id().await, Some(5));
        assert_eq!(sensor.read_temperature().await, Some(25.5));
    });
}

#[test]
fn holding_registers() {
    sensor_test(Sensor::new(SENSOR_ID), |mut sensor, _device| async move {
        let words = sensor.try_read_registers(modbus::READ_HOLDING_REGISTERS, registers::DEVICE_ID.address(), 2).await.unwrap();
        assert_eq!(words, [u16::from(SENSOR_ID), 9600]);
        assert_eq!(sensor.read(registers::BAUD_RATE).await, Some(9600));
        assert!(sensor.write_register(registers::BAUD_RATE.address(), 19200).await);
        assert_eq!(sensor.read(registers::BAUD_RATE).await, Some(19200));
    });
}
