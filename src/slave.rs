/*!
    simulated devices answering on a byte stream the way the real ones do on the bus

    they let the master side run against a [tokio::io::duplex] in place of a serial port. Each device is a cheap handle over a shared state, so a test can inspect or alter the device while [Drive::run] or [Sensor::run] serves the bus.
*/

use log::*;
use tokio::io::{AsyncRead, AsyncWrite, AsyncReadExt, AsyncWriteExt};
use std::{
    vec::Vec,
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    };

use crate::{
    command::{self, Payload, Velocity, Positioning, Ramp, Parameter, Direction, HOMING_DONE},
    fastech::{Frame, FrameProfile},
    modbus::{self, Request, Response, ResponseData, Registers},
    registers,
    status::AxisStatus,
    };


/// size of the reception buffer of simulated devices
const RECEIVE: usize = 512;

/// comm status answered to an unknown frame type
pub const UNKNOWN_COMMAND: u8 = 0x80;
/// comm status answered to a command with an invalid payload
pub const INVALID_PAYLOAD: u8 = 0x81;

/// modbus exception codes
pub const ILLEGAL_FUNCTION: u8 = 0x01;
pub const ILLEGAL_ADDRESS: u8 = 0x02;
pub const ILLEGAL_VALUE: u8 = 0x03;


/// state of a simulated FASTECH drive
#[derive(Clone, Debug)]
pub struct DriveState {
    pub slave_id: u8,
    pub profile: FrameProfile,
    /// an offline drive never answers
    pub online: bool,
    pub status: AxisStatus,
    /// position counter, reported only if [Self::report_position] is set
    pub position: i32,
    /// whether position requests are answered with the counter or with the status alone
    pub report_position: bool,
    /// forced comm status, answered without data to every command when non zero
    pub comm_status: u8,
    /// last jog started, as speed and direction
    pub jog: Option<(u32, Direction)>,
    /// last speed and acceleration set
    pub ramp: Option<Ramp>,
    pub teaching: bool,
    pub parameters: HashMap<u16, u32>,
    /// frame types of all commands addressed to this drive, in order
    pub received: Vec<u8>,
}

/// simulated FASTECH stepper drive
#[derive(Clone, Debug)]
pub struct Drive {
    state: Arc<Mutex<DriveState>>,
}

impl Drive {
    pub fn new(slave_id: u8) -> Self {
        Self::with_profile(slave_id, FrameProfile::default())
    }
    pub fn with_profile(slave_id: u8, profile: FrameProfile) -> Self {
        Self {state: Arc::new(Mutex::new(DriveState {
            slave_id,
            profile,
            online: true,
            status: AxisStatus::from(1u32 << AxisStatus::PT_STOPPED),
            position: 0,
            report_position: false,
            comm_status: 0,
            jog: None,
            ramp: None,
            teaching: false,
            parameters: HashMap::new(),
            received: Vec::new(),
        }))}
    }
    /// lock the state for inspection or alteration, it must not be held across an await
    pub fn state(&self) -> MutexGuard<'_, DriveState> {
        self.state.lock() .unwrap_or_else(PoisonError::into_inner)
    }
    /// frame types received so far
    pub fn received(&self) -> Vec<u8> {self.state().received.clone()}
    /// latch an alarm, as a fault of the power stage would
    pub fn raise_alarm(&self) {
        let mut state = self.state();
        state.status.set_error_all(true);
        state.status.set_motor_power(true);
        state.status.set_motioning(false);
        state.jog = None;
    }
    /// end the current motion, as if the axis reached its target
    pub fn finish_motion(&self) {
        let mut state = self.state();
        state.status.set_motioning(false);
        state.status.set_pt_stopped(true);
        if state.status.origin_returning() {
            state.status.set_origin_returning(false);
            state.status.set_origin_return_ok(true);
            state.position = 0;
        }
    }

    /**
        serve commands from the bus until it closes

        frames that cannot be decoded or that are addressed to another slave are dropped silently, as a drive on a shared bus does
    */
    pub async fn run<B: AsyncRead + AsyncWrite + Unpin>(&self, mut bus: B) -> std::io::Result<()> {
        let mut receive = [0u8; RECEIVE];
        loop {
            let size = bus.read(&mut receive).await?;
            if size == 0
                {return Ok(())}
            let Some(answer) = self.process(&receive[.. size])
                else {continue};
            bus.write_all(&answer).await?;
            bus.flush().await?;
        }
    }

    /// answer to one raw frame, if any
    fn process(&self, raw: &[u8]) -> Option<Vec<u8>> {
        let mut state = self.state();
        let profile = state.profile;
        let frame = match Frame::decode(&profile, raw) {
            Ok(frame) => frame,
            Err(error) => {
                debug!("drive dropped frame: {}", error);
                return None;
            },
        };
        if frame.slave_id != state.slave_id || !state.online
            {return None}
        state.received.push(frame.frame_type);

        let (comm_status, data) = if state.comm_status != 0
            {(state.comm_status, Payload::new())}
        else {
            match state.execute(frame.frame_type, &frame.payload) {
                Ok(data) => (0, data),
                Err(comm_status) => (comm_status, Payload::new()),
            }
        };
        let mut payload = Payload::new();
        payload.push(comm_status).ok()?;
        payload.extend_from_slice(&data).ok()?;
        let answer = Frame::new(frame.slave_id, frame.frame_type, &payload)
            .and_then(|frame| frame.encode(&profile));
        match answer {
            Ok(answer) => Some(answer.to_vec()),
            Err(error) => {
                warn!("drive cannot answer: {}", error);
                None
            },
        }
    }
}

impl DriveState {
    /// apply a command, returning the data answered or the comm status of a refusal
    fn execute(&mut self, code: u8, payload: &[u8]) -> Result<Payload, u8> {
        let table = self.profile.commands;
        let empty = Payload::new();
        let invalid = |_| INVALID_PAYLOAD;
        let encoded = |data: Result<Payload, _>| data.map_err(|_| INVALID_PAYLOAD);

        if code == table.servo_on {
            self.status.set_servo_on(true);
            Ok(empty)
        }
        else if code == table.servo_off {
            self.status.set_servo_on(false);
            self.halt();
            Ok(empty)
        }
        else if code == table.stop {
            self.halt();
            Ok(empty)
        }
        else if code == table.jog {
            let velocity: Velocity = command::decode(payload).map_err(invalid)?;
            let direction = Direction::try_from(velocity.direction).map_err(|_| INVALID_PAYLOAD)?;
            self.jog = Some((velocity.speed, direction));
            self.start_motion(direction);
            Ok(empty)
        }
        else if code == table.move_absolute || code == table.move_relative {
            let positioning: Positioning = command::decode(payload).map_err(invalid)?;
            let target = if code == table.move_absolute
                {positioning.position}
            else
                {self.position.saturating_add(positioning.position)};
            self.start_motion(Direction::of(i64::from(target) - i64::from(self.position)));
            self.position = target;
            Ok(empty)
        }
        else if code == table.homing {
            let _speed: u32 = command::decode(payload).map_err(invalid)?;
            self.status.set_origin_returning(true);
            self.status.set_origin_return_ok(false);
            self.start_motion(Direction::Reverse);
            Ok(empty)
        }
        else if code == table.read_position {
            if self.report_position
                {encoded(command::encode(self.position))}
            else
                {Ok(empty)}
        }
        else if code == table.read_status {
            encoded(command::encode(self.status))
        }
        else if code == table.alarm_reset {
            let servo = self.status.servo_on();
            self.status = AxisStatus::from(1u32 << AxisStatus::PT_STOPPED);
            self.status.set_servo_on(servo);
            Ok(empty)
        }
        else if code == table.set_speed {
            self.ramp = Some(command::decode(payload).map_err(invalid)?);
            Ok(empty)
        }
        else if code == table.teaching_mode {
            let enable: u8 = command::decode(payload).map_err(invalid)?;
            self.teaching = enable != 0;
            Ok(empty)
        }
        else if code == table.set_position {
            self.position = command::decode(payload).map_err(invalid)?;
            Ok(empty)
        }
        else if code == table.clear_position {
            self.position = 0;
            Ok(empty)
        }
        else if code == table.write_parameter {
            let parameter: Parameter = command::decode(payload).map_err(invalid)?;
            self.parameters.insert(parameter.address, parameter.value);
            if parameter.address == HOMING_DONE && parameter.value != 0
                {self.status.set_origin_return_ok(true)}
            Ok(empty)
        }
        else if code == table.read_parameter {
            let address: u16 = command::decode(payload).map_err(invalid)?;
            let value = self.parameters.get(&address).copied().unwrap_or(0);
            encoded(command::encode(value))
        }
        else {
            debug!("drive received unknown frame type {:#04x}", code);
            Err(UNKNOWN_COMMAND)
        }
    }

    fn start_motion(&mut self, direction: Direction) {
        self.status.set_motioning(true);
        self.status.set_pt_stopped(false);
        self.status.set_motion_direction(direction == Direction::Forward);
    }
    fn halt(&mut self) {
        self.jog = None;
        self.status.set_motioning(false);
        self.status.set_pt_stopped(true);
    }
}


/// state of a simulated Modbus temperature/humidity sensor
#[derive(Clone, Debug)]
pub struct SensorState {
    pub slave_id: u8,
    /// an offline sensor never answers
    pub online: bool,
    /// register space, addresses missing here answer an illegal address exception
    pub registers: HashMap<u16, u16>,
    /// all requests addressed to this sensor, in order
    pub received: Vec<Request>,
}

/// simulated Modbus RTU temperature/humidity sensor
#[derive(Clone, Debug)]
pub struct Sensor {
    state: Arc<Mutex<SensorState>>,
}

impl Sensor {
    /// sensor measuring 25.5 °C and 45.0 %
    pub fn new(slave_id: u8) -> Self {
        let registers = HashMap::from([
            (registers::TEMPERATURE.address(), 255),
            (registers::HUMIDITY.address(), 450),
            (registers::DEVICE_ID.address(), u16::from(slave_id)),
            (registers::BAUD_RATE.address(), 9600),
            ]);
        Self {state: Arc::new(Mutex::new(SensorState {
            slave_id,
            online: true,
            registers,
            received: Vec::new(),
        }))}
    }
    /// lock the state for inspection or alteration, it must not be held across an await
    pub fn state(&self) -> MutexGuard<'_, SensorState> {
        self.state.lock() .unwrap_or_else(PoisonError::into_inner)
    }
    /// set the measures, in tenths of °C and tenths of %
    pub fn set_measures(&self, temperature: i16, humidity: u16) {
        let mut state = self.state();
        state.registers.insert(registers::TEMPERATURE.address(), temperature as u16);
        state.registers.insert(registers::HUMIDITY.address(), humidity);
    }
    /// requests received so far
    pub fn received(&self) -> Vec<Request> {self.state().received.clone()}

    /// serve requests from the bus until it closes
    pub async fn run<B: AsyncRead + AsyncWrite + Unpin>(&self, mut bus: B) -> std::io::Result<()> {
        let mut receive = [0u8; RECEIVE];
        loop {
            let size = bus.read(&mut receive).await?;
            if size == 0
                {return Ok(())}
            let Some(answer) = self.process(&receive[.. size])
                else {continue};
            bus.write_all(&answer).await?;
            bus.flush().await?;
        }
    }

    fn process(&self, raw: &[u8]) -> Option<Vec<u8>> {
        let mut state = self.state();
        let request = match Request::decode(raw) {
            Ok(request) => request,
            Err(error) => {
                debug!("sensor dropped request: {}", error);
                return None;
            },
        };
        if request.slave_id != state.slave_id || !state.online
            {return None}
        state.received.push(request);

        match state.execute(&request) {
            Ok(data) => {
                let response = Response {
                    slave_id: request.slave_id,
                    function_code: request.function_code,
                    data,
                };
                response.encode()
                    .map_err(|error| warn!("sensor cannot answer: {}", error))
                    .ok()
                    .map(|frame| frame.to_vec())
            },
            Err(code) => Some(modbus::encode_exception(request.slave_id, request.function_code, code).to_vec()),
        }
    }
}

impl SensorState {
    /// apply a request, returning the response data or an exception code
    fn execute(&mut self, request: &Request) -> Result<ResponseData, u8> {
        match request.function_code {
            modbus::READ_HOLDING_REGISTERS | modbus::READ_INPUT_REGISTERS => {
                let count = usize::from(request.value);
                if count == 0 || count > modbus::MAX_REGISTERS
                    {return Err(ILLEGAL_VALUE)}
                let mut values = Registers::new();
                for offset in 0 .. request.value {
                    let address = request.address.checked_add(offset).ok_or(ILLEGAL_ADDRESS)?;
                    let value = self.registers.get(&address).copied().ok_or(ILLEGAL_ADDRESS)?;
                    values.push(value).map_err(|_| ILLEGAL_VALUE)?;
                }
                Ok(ResponseData::Registers(values))
            },
            modbus::WRITE_SINGLE_REGISTER => {
                if !self.registers.contains_key(&request.address)
                    {return Err(ILLEGAL_ADDRESS)}
                if request.address == registers::DEVICE_ID.address() {
                    let id = u8::try_from(request.value).map_err(|_| ILLEGAL_VALUE)?;
                    if !modbus::VALID_SLAVE_IDS.contains(&id)
                        {return Err(ILLEGAL_VALUE)}
                    // the echo still goes out with the former id
                    self.slave_id = id;
                }
                self.registers.insert(request.address, request.value);
                Ok(ResponseData::Written {address: request.address, value: request.value})
            },
            _ => Err(ILLEGAL_FUNCTION),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MotionCommand;

    fn command(drive: &Drive, command: MotionCommand) -> Option<(u8, Vec<u8>)> {
        let profile = drive.state().profile;
        let frame = Frame::new(drive.state().slave_id, command.code(&profile.commands), &command.payload().unwrap()).unwrap();
        let answer = drive.process(&frame.encode(&profile).unwrap())?;
        let frame = Frame::decode(&profile, &answer).unwrap();
        Some((frame.payload[0], frame.payload[1 ..].to_vec()))
    }

    #[test]
    fn drive_motion() {
        let drive = Drive::new(2);
        assert_eq!(command(&drive, MotionCommand::ServoOn), Some((0, std::vec![])));
        assert_eq!(command(&drive, MotionCommand::Jog {speed: 5000, direction: Direction::Forward}), Some((0, std::vec![])));
        assert_eq!(drive.state().jog, Some((5000, Direction::Forward)));
        assert!(drive.state().status.motioning());
        assert!(drive.state().status.motion_direction());

        let (_, data) = command(&drive, MotionCommand::ReadStatus).unwrap();
        let status: AxisStatus = command::decode(&data).unwrap();
        assert!(status.servo_on());
        assert!(status.motioning());

        command(&drive, MotionCommand::Stop).unwrap();
        assert!(drive.state().status.stopped());
        assert_eq!(drive.received(), std::vec![0x83, 0x37, 0x0D, 0x31]);
    }

    #[test]
    fn drive_refusals() {
        let drive = Drive::new(2);
        drive.state().online = false;
        assert_eq!(command(&drive, MotionCommand::ServoOn), None);
        assert!(drive.received().is_empty());

        drive.state().online = true;
        drive.state().comm_status = 0x05;
        assert_eq!(command(&drive, MotionCommand::ReadStatus), Some((0x05, std::vec![])));

        // another slave on the bus
        let other = Drive::new(3);
        let frame = Frame::new(2, 0x83, &[]).unwrap().encode(&FrameProfile::default()).unwrap();
        assert_eq!(other.process(&frame), None);
    }

    #[test]
    fn drive_position() {
        let drive = Drive::new(2);
        assert_eq!(command(&drive, MotionCommand::ReadPosition), Some((0, std::vec![])));
        drive.state().report_position = true;
        command(&drive, MotionCommand::SetPosition(-1234)).unwrap();
        assert_eq!(command(&drive, MotionCommand::ReadPosition), Some((0, (-1234i32).to_le_bytes().to_vec())));
        command(&drive, MotionCommand::MoveRelative {delta: 234, speed: 5000}).unwrap();
        assert_eq!(drive.state().position, -1000);
        command(&drive, MotionCommand::ClearPosition).unwrap();
        assert_eq!(drive.state().position, 0);
    }

    fn request(sensor: &Sensor, request: Request) -> Result<Response, crate::FrameError> {
        let answer = sensor.process(&request.encode()).ok_or(crate::FrameError::TooLong)?;
        Response::decode(&answer)
    }

    #[test]
    fn sensor_registers() {
        let sensor = Sensor::new(1);
        let response = request(&sensor, Request::read(1, modbus::READ_INPUT_REGISTERS, 0x0001, 2)).unwrap();
        assert_eq!(response.data, ResponseData::Registers(Registers::from_slice(&[255, 450]).unwrap()));

        assert_eq!(
            request(&sensor, Request::read(1, modbus::READ_INPUT_REGISTERS, 0x0010, 1)),
            Err(crate::FrameError::Exception(ILLEGAL_ADDRESS)),
            );
        assert_eq!(
            request(&sensor, Request::read(1, 0x10, 0x0001, 1)),
            Err(crate::FrameError::Exception(ILLEGAL_FUNCTION)),
            );
        assert_eq!(sensor.received().len(), 3);
    }

    #[test]
    fn sensor_device_id() {
        let sensor = Sensor::new(1);
        assert_eq!(
            request(&sensor, Request::write(1, 0x0101, 0)),
            Err(crate::FrameError::Exception(ILLEGAL_VALUE)),
            );
        let response = request(&sensor, Request::write(1, 0x0101, 5)).unwrap();
        assert_eq!(response.slave_id, 1);
        assert_eq!(response.data, ResponseData::Written {address: 0x0101, value: 5});
        assert_eq!(sensor.state().slave_id, 5);
        // the former id is no longer answered
        assert!(sensor.process(&Request::read(1, modbus::READ_INPUT_REGISTERS, 1, 1).encode()).is_none());
    }
}
