use log::*;
use tokio::io::{AsyncRead, AsyncWrite};
use serial2_tokio::SerialPort;
use std::{
    vec::Vec,
    time::SystemTime,
    };

use crate::{
    modbus::{self, Request, Response, ResponseData, MAX_REGISTERS, VALID_SLAVE_IDS},
    registers::{self, Register, RegisterValue},
    };
use super::{
    Error,
    networking::Channel,
    config::SensorConfig,
    };


/// one measure of both quantities
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SensorReading {
    /// degrees Celsius
    pub temperature_c: f32,
    /// relative humidity, percent
    pub humidity_pct: f32,
    /// when the measure was received
    pub timestamp: SystemTime,
}


/**
    Modbus RTU client of the temperature/humidity sensor

    measures are holding one decimal: a register value of 255 means 25.5. Values outside the [SensorLimits](super::SensorLimits) are reported but still returned and cached.
*/
pub struct SensorClient<P> {
    channel: Channel<P>,
    config: SensorConfig,
    temperature: Option<f32>,
    humidity: Option<f32>,
    reading: Option<SensorReading>,
}

impl SensorClient<SerialPort> {
    /// open the serial port of the sensor
    pub fn open(config: SensorConfig) -> Result<Self, Error> {
        let channel = Channel::open(&config.port, config.name.as_str())?;
        Ok(Self::new(channel, config))
    }
}

impl<P: AsyncRead + AsyncWrite + Unpin> SensorClient<P> {
    pub fn new(channel: Channel<P>, config: SensorConfig) -> Self {
        Self {
            channel,
            config,
            temperature: None,
            humidity: None,
            reading: None,
        }
    }

    pub fn config(&self) -> &SensorConfig {&self.config}
    /// last temperature and humidity read, in °C and %
    pub fn last_readings(&self) -> (Option<f32>, Option<f32>) {(self.temperature, self.humidity)}
    /// last complete measure
    pub fn last_reading(&self) -> Option<SensorReading> {self.reading}

    /**
        read `count` consecutive registers with the given read function

        the answer must come from the configured slave, echo the function code and carry exactly the registers requested
    */
    pub async fn try_read_registers(&mut self, function_code: u8, address: u16, count: u16) -> Result<Vec<u16>, Error> {
        if count == 0 || usize::from(count) > MAX_REGISTERS
            {return Err(Error::InvalidArgument("register count must be 1 to 125"))}
        if ! matches!(function_code, modbus::READ_HOLDING_REGISTERS | modbus::READ_INPUT_REGISTERS)
            {return Err(Error::InvalidArgument("not a register read function"))}

        let request = Request::read(self.config.slave_id, function_code, address, count);
        let response = self.transact(&request).await?;
        match response.data {
            ResponseData::Registers(registers) => {
                if registers.len() != usize::from(count)
                    {return Err(Error::Mismatch("register count"))}
                Ok(registers.to_vec())
            },
            ResponseData::Written {..} => Err(Error::Mismatch("function code")),
        }
    }
    /// read `count` consecutive registers, `None` if the sensor did not answer correctly
    pub async fn read_register(&mut self, function_code: u8, address: u16, count: u16) -> Option<Vec<u16>> {
        self.try_read_registers(function_code, address, count).await
            .map_err(|error| warn!(target: self.name(), "reading {:#06x} failed: {}", address, error))
            .ok()
    }
    /// read and convert one register with the configured read function
    pub async fn read<T: RegisterValue>(&mut self, register: Register<T>) -> Option<T> {
        let words = self.read_register(self.config.read_function, register.address(), 1).await?;
        words.first() .map(|&word| T::from_word(word))
    }

    /// write a single register, checking the echo of the sensor
    pub async fn try_write_register(&mut self, address: u16, value: u16) -> Result<(), Error> {
        let request = Request::write(self.config.slave_id, address, value);
        let response = self.transact(&request).await?;
        match response.data {
            ResponseData::Written {address: echo_address, value: echo_value} => {
                if (echo_address, echo_value) != (address, value)
                    {return Err(Error::Mismatch("write echo"))}
                Ok(())
            },
            ResponseData::Registers(_) => Err(Error::Mismatch("function code")),
        }
    }
    pub async fn write_register(&mut self, address: u16, value: u16) -> bool {
        self.try_write_register(address, value).await
            .map_err(|error| warn!(target: self.name(), "writing {:#06x} failed: {}", address, error))
            .is_ok()
    }

    /// temperature in °C
    pub async fn read_temperature(&mut self) -> Option<f32> {
        let value = self.read(registers::TEMPERATURE).await?.value();
        self.check_temperature(value);
        self.temperature = Some(value);
        info!(target: self.name(), "temperature {:.1} °C", value);
        Some(value)
    }
    /// relative humidity in %
    pub async fn read_humidity(&mut self) -> Option<f32> {
        let value = self.read(registers::HUMIDITY).await?.value();
        self.check_humidity(value);
        self.humidity = Some(value);
        info!(target: self.name(), "humidity {:.1} %", value);
        Some(value)
    }
    /// read both measures in a single request
    pub async fn read_reading(&mut self) -> Option<SensorReading> {
        let words = self.read_register(self.config.read_function, registers::TEMPERATURE.address(), 2).await?;
        let temperature = registers::Tenths::from_word(words[0]).value();
        let humidity = registers::Tenths::from_word(words[1]).value();
        self.check_temperature(temperature);
        self.check_humidity(humidity);

        let reading = SensorReading {
            temperature_c: temperature,
            humidity_pct: humidity,
            timestamp: SystemTime::now(),
        };
        self.temperature = Some(temperature);
        self.humidity = Some(humidity);
        self.reading = Some(reading);
        info!(target: self.name(), "temperature {:.1} °C, humidity {:.1} %", temperature, humidity);
        Some(reading)
    }

    /// modbus address stored in the sensor
    pub async fn read_device_id(&mut self) -> Option<u8> {
        let words = self.read_register(modbus::READ_HOLDING_REGISTERS, registers::DEVICE_ID.address(), 1).await?;
        u8::try_from(words[0])
            .map_err(|_| warn!(target: self.name(), "invalid device id {}", words[0]))
            .ok()
    }

    /**
        change the modbus address of the sensor

        the id must be in 1..=247, otherwise nothing is sent. On success the client addresses the sensor with its new id.
    */
    pub async fn change_device_id(&mut self, slave_id: u8) -> bool {
        if ! VALID_SLAVE_IDS.contains(&slave_id) {
            error!(target: self.name(), "invalid slave id {}", slave_id);
            return false;
        }
        if ! self.write_register(registers::DEVICE_ID.address(), slave_id.into()).await
            {return false}
        info!(target: self.name(), "slave id changed from {} to {}", self.config.slave_id, slave_id);
        self.config.slave_id = slave_id;
        true
    }


    fn name(&self) -> &str {self.channel.name()}

    async fn transact(&mut self, request: &Request) -> Result<Response, Error> {
        let raw = self.channel.transact(&request.encode(), self.config.settle).await?;
        let response = Response::decode(&raw)?;
        if response.slave_id != request.slave_id
            {return Err(Error::Mismatch("slave id"))}
        if response.function_code != request.function_code
            {return Err(Error::Mismatch("function code"))}
        Ok(response)
    }

    fn check_temperature(&self, value: f32) {
        let limits = self.config.limits;
        if !(limits.temp_min ..= limits.temp_max).contains(&value) {
            warn!(target: self.name(), "temperature {:.1} °C outside [{}, {}]", value, limits.temp_min, limits.temp_max);
        }
    }
    fn check_humidity(&self, value: f32) {
        let limits = self.config.limits;
        if !(limits.humidity_min ..= limits.humidity_max).contains(&value) {
            warn!(target: self.name(), "humidity {:.1} % outside [{}, {}]", value, limits.humidity_min, limits.humidity_max);
        }
    }
}
