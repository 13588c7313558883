#![allow(dead_code)]

use std::time::Duration;
use futures_concurrency::future::Race;
use tokio::io::{duplex, DuplexStream};

use ezibus::{
    master::*,
    slave::{Drive, Sensor},
    };


pub const MOTOR_ID: u8 = 2;
pub const SENSOR_ID: u8 = 1;

/// motor settings fit for the simulated drive, which answers immediately
pub fn motor_config() -> MotorConfig {
    MotorConfig {
        name: "test-motor".into(),
        port: PortConfig {timeout: Duration::from_millis(100), .. PortConfig::motor("duplex")},
        settle: Duration::from_millis(1),
        .. MotorConfig::default()
    }
}
/// sensor settings fit for the simulated sensor
pub fn sensor_config() -> SensorConfig {
    SensorConfig {
        name: "test-sensor".into(),
        port: PortConfig {timeout: Duration::from_millis(100), .. PortConfig::sensor("duplex")},
        settle: Duration::from_millis(1),
        .. SensorConfig::default()
    }
}

/// run the given test on a runtime, with the device serving the other end of the link
fn serve<T, D, F, G>(device: D, test: T)
where
    T: FnOnce(DuplexStream) -> F,
    D: FnOnce(DuplexStream) -> G,
    F: Future,
    G: Future<Output = ()>,
{
    let _ = env_logger::builder().is_test(true).try_init();
    tokio::runtime::Runtime::new()
    .expect("failed to create runtime")
    .block_on(async move {
        let (master, slave) = duplex(1024);
        (
            async {
                tokio::time::timeout(Duration::from_secs(10), test(master))
                .await.expect("aborted test because took too long");
            },
            async {
                device(slave).await;
                // a device stopping before the test would make it pass early
                std::future::pending::<()>().await;
            },
        ).race().await;
    });
}

/// run a test against a simulated drive with the given config
pub fn motor_test_with<T, F>(config: MotorConfig, drive: Drive, test: T)
where
    T: FnOnce(MotionController<DuplexStream>, Drive) -> F,
    F: Future,
{
    let served = drive.clone();
    serve(
        move |bus| async move {served.run(bus).await.expect("drive communication failed");},
        move |port| {
            let channel = Channel::new(port, &config.port, config.name.clone());
            test(MotionController::new(channel, config), drive)
        },
        );
}
/// run a test against a simulated drive
pub fn motor_test<T, F>(drive: Drive, test: T)
where
    T: FnOnce(MotionController<DuplexStream>, Drive) -> F,
    F: Future,
{
    motor_test_with(motor_config(), drive, test)
}

/// run a test against a simulated sensor
pub fn sensor_test<T, F>(sensor: Sensor, test: T)
where
    T: FnOnce(SensorClient<DuplexStream>, Sensor) -> F,
    F: Future,
{
    let config = sensor_config();
    let served = sensor.clone();
    serve(
        move |bus| async move {served.run(bus).await.expect("sensor communication failed");},
        move |port| {
            let channel = Channel::new(port, &config.port, config.name.clone());
            test(SensorClient::new(channel, config), sensor)
        },
        );
}
