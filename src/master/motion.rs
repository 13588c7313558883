use log::*;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    time::{sleep, Instant},
    };
use serial2_tokio::SerialPort;
use std::time::Duration;

use crate::{
    command::{self, MotionCommand, Direction},
    fastech::{Frame, Response},
    status::AxisStatus,
    };
use super::{
    Error,
    networking::Channel,
    config::{MotorConfig, Positioning},
    };


/// state of the motor as known by the controller
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MotorState {
    /// servo enabled, not moving
    Idle,
    /// power stage disabled, initial state
    ServoOff,
    Moving,
    Homing,
    /// an alarm was reported, cleared only by [MotionController::alarm_reset]
    Error,
}

/// jog currently running, used to integrate the travelled distance
#[derive(Copy, Clone, Debug)]
struct JogTracking {
    start: Instant,
    speed: u32,
    direction: Direction,
    /// issued by a positioning move, which commits its own position
    simulated: bool,
}
impl JogTracking {
    /// signed distance travelled since the jog started, in pulses
    fn travelled(&self) -> i64 {
        let distance = f64::from(self.speed) * self.start.elapsed().as_secs_f64();
        self.direction.sign() * distance as i64
    }
}

/// way the position estimate is updated at the end of a positioning
#[derive(Copy, Clone, Debug)]
enum Goal {
    Absolute(i32),
    Relative(i32),
}


/**
    stepper motor controller speaking the FASTECH protocol

    the drive does not report its live position in the operating mode used here, so the controller keeps an estimate integrated from the commanded jogs. Positioning moves are carried out according to [Positioning].

    the state only changes when the drive acknowledges a command: a non empty, valid frame from the right slave with a success status.
*/
pub struct MotionController<P> {
    channel: Channel<P>,
    config: MotorConfig,
    state: MotorState,
    /// committed position estimate, in pulses
    position: i32,
    jog: Option<JogTracking>,
    /// target of a direct positioning, committed once the drive reports it stopped
    target: Option<i32>,
    status: Option<AxisStatus>,
}

impl MotionController<SerialPort> {
    /// open the serial port of the drive
    pub fn open(config: MotorConfig) -> Result<Self, Error> {
        let channel = Channel::open(&config.port, config.name.as_str())?;
        Ok(Self::new(channel, config))
    }
}

impl<P: AsyncRead + AsyncWrite + Unpin> MotionController<P> {
    pub fn new(channel: Channel<P>, config: MotorConfig) -> Self {
        Self {
            channel,
            config,
            state: MotorState::ServoOff,
            position: 0,
            jog: None,
            target: None,
            status: None,
        }
    }

    pub fn config(&self) -> &MotorConfig {&self.config}
    pub fn state(&self) -> MotorState {self.state}
    /// last committed position estimate, in pulses
    pub fn position(&self) -> i32 {self.position}
    /// last status word received
    pub fn last_status(&self) -> Option<AxisStatus> {self.status}
    /// position estimate including the distance travelled by a running jog
    pub fn estimated_position(&self) -> i32 {
        match self.jog {
            Some(jog) => saturate(i64::from(self.position) + jog.travelled()),
            None => self.position,
        }
    }

    /**
        send a command and wait for its acknowledgment

        this is the lowest level of exchange, it does not change the controller state
    */
    pub async fn command(&mut self, command: MotionCommand) -> Result<Response, Error> {
        let profile = self.config.profile;
        let frame = Frame::new(
            self.config.slave_id,
            command.code(&profile.commands),
            &command.payload()?,
            )?;
        let raw = self.channel.transact(&frame.encode(&profile)?, self.config.settle).await?;
        let response = Response::from(Frame::decode(&profile, &raw)?);
        if response.slave_id != frame.slave_id
            {return Err(Error::Mismatch("slave id"))}
        if response.frame_type != frame.frame_type
            {return Err(Error::Mismatch("frame type"))}
        if !response.success()
            {return Err(Error::Refused(response.comm_status))}
        Ok(response)
    }

    /// send a command, logging why it was not acknowledged
    async fn acknowledged(&mut self, command: MotionCommand) -> Option<Response> {
        match self.command(command).await {
            Ok(response) => Some(response),
            Err(error) => {
                warn!(target: self.name(), "{:?} not acknowledged: {}", command, error);
                None
            },
        }
    }

    /// enable the power stage and prepare the drive for motion without homing
    pub async fn servo_on(&mut self) -> bool {
        if self.acknowledged(MotionCommand::ServoOn).await.is_none() {
            error!(target: self.name(), "servo on failed");
            return false;
        }
        self.transition(MotorState::Idle);
        info!(target: self.name(), "servo on");

        // the drive on the bench has no home sensor wired and latches a homing-required alarm, teaching mode lets it move anyway
        let (speed, acceleration) = (self.config.default_speed, self.config.acceleration);
        self.set_speed_params(speed, acceleration).await;
        self.enable_teaching_mode().await;
        true
    }

    pub async fn servo_off(&mut self) -> bool {
        if self.acknowledged(MotionCommand::ServoOff).await.is_none()
            {return false}
        self.commit_jog();
        self.target = None;
        self.transition(MotorState::ServoOff);
        info!(target: self.name(), "servo off");
        true
    }

    /// start a continuous motion, speed is clamped to the range the drive accepts
    pub async fn jog(&mut self, speed: u32, direction: Direction) -> bool {
        let speed = self.clamp_speed(speed);
        match self.try_jog(speed, direction, false).await {
            Ok(()) => {
                info!(target: self.name(), "jog {:?} at {} pps", direction, speed);
                true
            },
            Err(error) => {
                error!(target: self.name(), "jog failed: {}", error);
                false
            },
        }
    }
    async fn try_jog(&mut self, speed: u32, direction: Direction, simulated: bool) -> Result<(), Error> {
        self.check_alarm()?;
        self.command(MotionCommand::Jog {speed, direction}).await?;
        // a jog replacing a running one ends its segment
        self.commit_jog();
        self.jog = Some(JogTracking {
            start: Instant::now(),
            speed,
            direction,
            simulated,
        });
        self.transition(MotorState::Moving);
        Ok(())
    }

    /// stop the motor, committing the distance travelled by a running jog
    pub async fn stop(&mut self) -> bool {
        match self.try_stop().await {
            Ok(()) => true,
            Err(error) => {
                error!(target: self.name(), "stop failed: {}", error);
                false
            },
        }
    }
    async fn try_stop(&mut self) -> Result<(), Error> {
        self.command(MotionCommand::Stop).await?;
        self.commit_jog();
        self.target = None;
        if self.state != MotorState::ServoOff
            {self.transition(MotorState::Idle)}
        debug!(target: self.name(), "stopped at {}", self.position);
        Ok(())
    }

    /// move to the given position, rejected without any exchange if outside limits
    pub async fn move_absolute(&mut self, position: i32, speed: u32) -> bool {
        self.positioning(Goal::Absolute(position), speed).await
    }
    /// move by the given distance from the current estimate
    pub async fn move_relative(&mut self, delta: i32, speed: u32) -> bool {
        self.positioning(Goal::Relative(delta), speed).await
    }
    async fn positioning(&mut self, goal: Goal, speed: u32) -> bool {
        match self.try_positioning(goal, speed).await {
            Ok(()) => true,
            Err(error) => {
                error!(target: self.name(), "{:?} failed: {}", goal, error);
                false
            },
        }
    }
    async fn try_positioning(&mut self, goal: Goal, speed: u32) -> Result<(), Error> {
        // a running jog is still moving the axis away from the committed estimate
        let (target, delta) = self.resolve(goal, self.estimated_position());
        self.check_limits(target)?;
        self.check_alarm()?;
        let speed = self.clamp_speed(speed);
        if speed == 0
            {return Err(Error::InvalidArgument("positioning speed must not be 0"))}
        if self.jog.is_none() && delta.unsigned_abs() < u64::from(self.config.arrival_threshold) {
            debug!(target: self.name(), "already at {}", target);
            return Ok(());
        }

        match self.config.positioning {
            Positioning::TimedJog => {
                self.try_stop().await?;
                // stopping committed the running jog, if any
                let (target, delta) = self.resolve(goal, self.position);
                self.check_limits(target)?;
                if delta.unsigned_abs() < u64::from(self.config.arrival_threshold) {
                    debug!(target: self.name(), "already at {}", target);
                    return Ok(());
                }

                self.try_jog(speed, Direction::of(delta), true).await?;
                let duration = delta.unsigned_abs() as f64 / f64::from(speed);
                sleep(Duration::from_secs_f64(duration)).await;
                if let Err(error) = self.try_stop().await {
                    // the motion still runs, a later stop will integrate it
                    if let Some(jog) = self.jog.as_mut()
                        {jog.simulated = false}
                    return Err(error);
                }
                // the estimate is set rather than integrated, to cancel timing errors
                self.position = match goal {
                    Goal::Absolute(position) => position,
                    Goal::Relative(delta) => self.position.saturating_add(delta),
                };
                info!(target: self.name(), "arrived at {}", self.position);
            },
            Positioning::Direct => {
                let command = match goal {
                    Goal::Absolute(position) => MotionCommand::MoveAbsolute {target: position, speed},
                    Goal::Relative(delta) => MotionCommand::MoveRelative {delta, speed},
                };
                self.command(command).await?;
                self.commit_jog();
                self.target = Some(saturate(target));
                self.transition(MotorState::Moving);
                info!(target: self.name(), "moving to {}", target);
            },
        }
        Ok(())
    }

    /// start the homing sequence, completion is observed by [Self::read_status]
    pub async fn home(&mut self, speed: u32) -> bool {
        if let Err(error) = self.check_alarm() {
            error!(target: self.name(), "homing refused: {}", error);
            return false;
        }
        if self.acknowledged(MotionCommand::Home {speed}).await.is_none()
            {return false}
        self.commit_jog();
        self.target = None;
        self.transition(MotorState::Homing);
        info!(target: self.name(), "homing at {} pps", speed);
        true
    }

    /**
        current position in pulses

        the drive position overwrites the estimate when it answers with one, otherwise the software estimate is returned
    */
    pub async fn read_position(&mut self) -> i32 {
        let position = match self.command(MotionCommand::ReadPosition).await {
            Ok(response) => command::decode::<i32>(&response.data),
            Err(error) => {
                debug!(target: self.name(), "position not read: {}", error);
                return self.estimated_position();
            },
        };
        match position {
            Ok(position) => {
                self.position = position;
                // a running jog is integrated from this point on
                if let Some(jog) = self.jog.as_mut()
                    {jog.start = Instant::now()}
                position
            },
            Err(error) => {
                debug!(target: self.name(), "position not parsed: {}", error);
                self.estimated_position()
            },
        }
    }

    /**
        read the status word of the drive

        an alarm forces the [MotorState::Error] state, the end of a homing or of a direct positioning is detected here
    */
    pub async fn read_status(&mut self) -> Option<AxisStatus> {
        let response = self.acknowledged(MotionCommand::ReadStatus).await?;
        let status = match command::decode::<AxisStatus>(&response.data) {
            Ok(status) => status,
            Err(error) => {
                warn!(target: self.name(), "invalid status: {}", error);
                return None;
            },
        };
        self.status = Some(status);

        if status.alarm() {
            if self.state != MotorState::Error
                {warn!(target: self.name(), "alarm raised: {:?}", status)}
            self.commit_jog();
            self.target = None;
            self.state = MotorState::Error;
        }
        else if status.stopped() {
            match self.state {
                MotorState::Homing => {
                    self.position = 0;
                    self.state = MotorState::Idle;
                    info!(target: self.name(), "homing done");
                },
                MotorState::Moving => if let Some(target) = self.target.take() {
                    self.position = target;
                    self.state = MotorState::Idle;
                    info!(target: self.name(), "arrived at {}", target);
                },
                _ => {},
            }
        }
        Some(status)
    }

    /// clear a latched alarm
    pub async fn alarm_reset(&mut self) -> bool {
        if self.acknowledged(MotionCommand::AlarmReset).await.is_none()
            {return false}
        if self.state == MotorState::Error {
            self.state = MotorState::Idle;
            info!(target: self.name(), "alarm cleared");
        }
        true
    }

    /// set default speed and acceleration of the drive
    pub async fn set_speed_params(&mut self, speed: u32, acceleration: u32) -> bool {
        self.acknowledged(MotionCommand::SetSpeed {speed, acceleration}).await.is_some()
    }
    /// let the drive move without a completed homing
    pub async fn enable_teaching_mode(&mut self) -> bool {
        self.acknowledged(MotionCommand::TeachingMode(true)).await.is_some()
    }
    /// pretend the homing sequence completed, for drives without home sensor
    pub async fn disable_homing_check(&mut self) -> bool {
        self.write_parameter(command::HOMING_DONE, 1).await
    }
    pub async fn write_parameter(&mut self, address: u16, value: u32) -> bool {
        self.acknowledged(MotionCommand::WriteParameter {address, value}).await.is_some()
    }
    pub async fn read_parameter(&mut self, address: u16) -> Option<u32> {
        let response = self.acknowledged(MotionCommand::ReadParameter {address}).await?;
        command::decode(&response.data)
            .map_err(|error| warn!(target: self.name(), "invalid parameter value: {}", error))
            .ok()
    }

    /// declare the current position of the drive, resetting the estimate
    pub async fn set_position(&mut self, position: i32) -> bool {
        if self.acknowledged(MotionCommand::SetPosition(position)).await.is_none()
            {return false}
        self.position = position;
        if let Some(jog) = self.jog.as_mut()
            {jog.start = Instant::now()}
        true
    }
    /// set the position counter of the drive and the estimate to 0
    pub async fn clear_position(&mut self) -> bool {
        if self.acknowledged(MotionCommand::ClearPosition).await.is_none()
            {return false}
        self.position = 0;
        if let Some(jog) = self.jog.as_mut()
            {jog.start = Instant::now()}
        true
    }


    fn name(&self) -> &str {self.channel.name()}

    /// state changes from acknowledged commands, an alarm is only cleared by an alarm reset
    fn transition(&mut self, next: MotorState) {
        if self.state == MotorState::Error {
            debug!(target: self.name(), "staying in error state instead of {:?}", next);
            return;
        }
        self.state = next;
    }

    /// end the tracking of a running jog, adding its travel to the estimate unless it belongs to a positioning
    fn commit_jog(&mut self) {
        if let Some(jog) = self.jog.take() {
            if !jog.simulated {
                self.position = saturate(i64::from(self.position) + jog.travelled());
            }
        }
    }

    /// absolute target and remaining distance of a positioning
    fn resolve(&self, goal: Goal, current: i32) -> (i64, i64) {
        let current = i64::from(current);
        match goal {
            Goal::Absolute(position) => (i64::from(position), i64::from(position) - current),
            Goal::Relative(delta) => (current + i64::from(delta), i64::from(delta)),
        }
    }

    fn check_limits(&self, position: i64) -> Result<(), Error> {
        let limits = self.config.limits;
        if limits.contains(position)
            {Ok(())}
        else
            {Err(Error::LimitViolation {position, min: limits.min_position, max: limits.max_position})}
    }

    fn check_alarm(&self) -> Result<(), Error> {
        if self.state == MotorState::Error
            {Err(Error::DeviceAlarm(self.status.unwrap_or_default()))}
        else
            {Ok(())}
    }

    fn clamp_speed(&self, speed: u32) -> u32 {
        let clamped = speed.max(self.config.min_speed).min(self.config.max_speed());
        if clamped != speed {
            warn!(target: self.name(), "speed {} pps out of range, using {} pps", speed, clamped);
        }
        clamped
    }
}

fn saturate(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}


#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
    use crate::{
        fastech::FrameProfile,
        master::PortConfig,
        };

    #[tokio::test]
    async fn answer_to_another_command() {
        let config = MotorConfig {
            port: PortConfig {timeout: Duration::from_millis(100), .. PortConfig::motor("duplex")},
            settle: Duration::from_millis(1),
            .. MotorConfig::default()
        };
        let (master, mut slave) = duplex(256);
        let channel = Channel::new(master, &config.port, "test");
        let mut motor = MotionController::new(channel, config);
        let profile = FrameProfile::default();
        let device = async {
            let mut buffer = [0u8; 256];
            let size = slave.read(&mut buffer).await.unwrap();
            let request = Frame::decode(&profile, &buffer[.. size]).unwrap();
            assert_eq!(request.frame_type, 0x37);
            // a valid status frame instead of the jog acknowledgment
            let answer = Frame::new(request.slave_id, 0x0D, &[0, 0, 0, 0, 0]).unwrap();
            slave.write_all(&answer.encode(&profile).unwrap()).await.unwrap();
        };
        let (jogged, ()) = tokio::join!(motor.jog(10_000, Direction::Forward), device);
        assert!(!jogged);
        assert_eq!(motor.state(), MotorState::ServoOff);
        assert!(motor.jog.is_none());
        assert_eq!(motor.estimated_position(), 0);
    }
}
