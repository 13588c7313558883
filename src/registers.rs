/*!
    register map of the temperature/humidity sensor

    registers are typed pointers in the Modbus register space of the sensor, holding the address and the way the value is scaled.
*/

use core::marker::PhantomData;


/**
    a register is a typed pointer in the sensor's register space.

    it only holds the register address, hence can be created, copied or destroyed at no cost
*/
#[derive(PartialEq, Hash)]
pub struct Register<T> {
    addr: u16,
    ty: PhantomData<T>,
}
impl<T> Register<T> {
    /// create a register from its address
    pub const fn new(address: u16) -> Self {
        Self{addr: address, ty: PhantomData}
    }
    /// address of the register
    pub const fn address(&self) -> u16 {self.addr}
}
impl<T> Clone for Register<T> {
    fn clone(&self) -> Self {
        Self::new(self.address())
    }
}
impl<T> Copy for Register<T> {}
impl<T> core::fmt::Debug for Register<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Register({:#06x})", self.addr)
    }
}

/// conversion between a register word and its meaning
pub trait RegisterValue: Sized {
    fn from_word(word: u16) -> Self;
    fn to_word(self) -> u16;
}
impl RegisterValue for u16 {
    fn from_word(word: u16) -> Self {word}
    fn to_word(self) -> u16 {self}
}

/// signed fixed point value with one decimal, as the sensor reports its measures
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Tenths(pub i16);
impl Tenths {
    pub fn value(self) -> f32 {
        f32::from(self.0) / 10.
    }
}
impl RegisterValue for Tenths {
    // temperature goes below zero, so the word is two's complement
    fn from_word(word: u16) -> Self {Self(word as i16)}
    fn to_word(self) -> u16 {self.0 as u16}
}


/// temperature in tenths of °C
pub const TEMPERATURE: Register<Tenths> = Register::new(0x0001);
/// relative humidity in tenths of %
pub const HUMIDITY: Register<Tenths> = Register::new(0x0002);
/// modbus slave id of the sensor, writable
pub const DEVICE_ID: Register<u16> = Register::new(0x0101);
/// baud rate code of the sensor
pub const BAUD_RATE: Register<u16> = Register::new(0x0102);


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling() {
        assert_eq!(Tenths::from_word(255).value(), 25.5);
        assert_eq!(Tenths::from_word(605).value(), 60.5);
        assert_eq!(Tenths::from_word((-123i16) as u16).value(), -12.3);
        assert_eq!(Tenths(-400).to_word(), 0xFE70);
    }
}
