use log::*;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncReadExt, AsyncWriteExt},
    time::{sleep, timeout},
    };
use serial2_tokio::{SerialPort, CharSize};
use std::{
    string::String,
    vec::Vec,
    time::Duration,
    };

use super::{
    Error,
    config::{PortConfig, Parity, StopBits},
    };


/// size of the reception buffer, larger than any frame of both protocols
const RECEIVE: usize = 512;


/**
    transaction channel over one serial link

    a transaction writes a whole frame, waits a settle delay, then performs a single read bounded by the link timeout. There is no reassembly of frames split over several reads, and no queue: the `&mut self` receiver makes sure only one transaction is in flight.

    the port is generic so any tokio byte stream can replace the serial link
*/
pub struct Channel<P> {
    port: P,
    timeout: Duration,
    /// log target
    name: String,
}

impl Channel<SerialPort> {
    /// open the serial port described by the given settings
    pub fn open(config: &PortConfig, name: impl Into<String>) -> Result<Self, Error> {
        let char_size = match config.char_size {
            5 => CharSize::Bits5,
            6 => CharSize::Bits6,
            7 => CharSize::Bits7,
            8 => CharSize::Bits8,
            _ => return Err(Error::InvalidArgument("character size must be 5 to 8 bits")),
        };
        let port = SerialPort::open(&config.path, |mut settings: serial2_tokio::Settings| {
                settings.set_raw();
                settings.set_baud_rate(config.baud_rate)?;
                settings.set_char_size(char_size);
                settings.set_stop_bits(match config.stop_bits {
                    StopBits::One => serial2_tokio::StopBits::One,
                    StopBits::Two => serial2_tokio::StopBits::Two,
                    });
                settings.set_parity(match config.parity {
                    Parity::None => serial2_tokio::Parity::None,
                    Parity::Odd => serial2_tokio::Parity::Odd,
                    Parity::Even => serial2_tokio::Parity::Even,
                    });
                Ok(settings)
                })
            .map_err(Error::PortUnavailable)?;
        let channel = Self::new(port, config, name);
        info!(target: channel.name(), "opened {} @ {} bps", config.path, config.baud_rate);
        Ok(channel)
    }
}

impl<P: AsyncRead + AsyncWrite + Unpin> Channel<P> {
    /// channel on an already opened byte stream, only the timeout is used from the settings
    pub fn new(port: P, config: &PortConfig, name: impl Into<String>) -> Self {
        Self {
            port,
            timeout: config.timeout,
            name: name.into(),
        }
    }
    /// log target of this channel
    pub fn name(&self) -> &str {&self.name}

    /**
        send a frame and return the bytes answered

        fails with [Error::Timeout] if nothing arrived in time, with [Error::Bus] if the port failed
    */
    pub async fn transact(&mut self, frame: &[u8], settle: Duration) -> Result<Vec<u8>, Error> {
        // answers arriving after a previous timeout must not be taken for this one
        let mut stale = [0u8; RECEIVE];
        while let Ok(Ok(size)) = timeout(Duration::ZERO, self.port.read(&mut stale)).await {
            if size == 0 {break}
            debug!(target: self.name(), "dropped stale {:02X?}", &stale[.. size]);
        }

        debug!(target: self.name(), "send {:02X?}", frame);
        self.port.write_all(frame).await?;
        self.port.flush().await?;
        sleep(settle).await;

        let mut receive = [0u8; RECEIVE];
        let size = timeout(self.timeout, self.port.read(&mut receive)).await
            .map_err(|_| Error::Timeout)??;
        if size == 0
            {return Err(Error::Timeout)}
        let received = &receive[.. size];
        debug!(target: self.name(), "received {:02X?}", received);
        Ok(received.to_vec())
    }

    /// send a frame and return the bytes answered, or `None` if nothing came back
    pub async fn send_receive(&mut self, frame: &[u8], settle: Duration) -> Option<Vec<u8>> {
        match self.transact(frame, settle).await {
            Ok(received) => Some(received),
            Err(Error::Timeout) => {
                warn!(target: self.name(), "no response");
                None
            },
            Err(error) => {
                error!(target: self.name(), "transaction failed: {}", error);
                None
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn config() -> PortConfig {
        PortConfig {timeout: Duration::from_millis(50), .. PortConfig::default()}
    }

    #[tokio::test]
    async fn exchange() {
        let (master, mut slave) = duplex(64);
        let mut channel = Channel::new(master, &config(), "test");
        let device = async {
            let mut buffer = [0u8; 8];
            let size = slave.read(&mut buffer).await.unwrap();
            assert_eq!(&buffer[.. size], &[1, 2, 3]);
            slave.write_all(&[4, 5]).await.unwrap();
        };
        let (received, ()) = tokio::join!(channel.send_receive(&[1, 2, 3], Duration::from_millis(1)), device);
        assert_eq!(received, Some(std::vec![4, 5]));
    }

    #[tokio::test]
    async fn stale_answer_dropped() {
        let (master, mut slave) = duplex(64);
        let mut channel = Channel::new(master, &config(), "test");
        // late answer to a transaction that already timed out
        slave.write_all(&[9, 9, 9]).await.unwrap();
        let device = async {
            let mut buffer = [0u8; 8];
            let size = slave.read(&mut buffer).await.unwrap();
            assert_eq!(&buffer[.. size], &[1]);
            slave.write_all(&[4, 5]).await.unwrap();
        };
        let (received, ()) = tokio::join!(channel.transact(&[1], Duration::from_millis(1)), device);
        assert_eq!(received.unwrap(), [4, 5]);
    }

    #[tokio::test]
    async fn silence() {
        let (master, _slave) = duplex(64);
        let mut channel = Channel::new(master, &config(), "test");
        assert!(matches!(channel.transact(&[1], Duration::ZERO).await, Err(Error::Timeout)));
        assert_eq!(channel.send_receive(&[1], Duration::ZERO).await, None);
    }

    #[tokio::test]
    async fn closed() {
        let (master, slave) = duplex(64);
        drop(slave);
        let mut channel = Channel::new(master, &config(), "test");
        assert_eq!(channel.send_receive(&[1], Duration::ZERO).await, None);
    }
}
