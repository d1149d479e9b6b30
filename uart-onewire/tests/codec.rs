use std::time::Duration;

use onewire_sim::{SimDevice, SimError, SimUart};
use uart_onewire::{BaudRate, Command, OneWire, OneWireError, UartOneWire, UartOneWireBuilder};

const ROM_A: u64 = 0x2b0000047ff88528;
const ROM_B: u64 = 0x4e0000047fae9428;

fn bus(uart: &mut SimUart) -> UartOneWire<&mut SimUart> {
    UartOneWireBuilder::default()
        .with_timeout(Duration::ZERO)
        .build(uart)
        .unwrap()
}

#[test]
fn reset_on_a_disconnected_line_is_a_wiring_fault() {
    let mut uart = SimUart::disconnected().with_device(SimDevice::new(ROM_A));
    assert!(matches!(bus(&mut uart).reset(), Err(OneWireError::WiringFault)));
}

#[test]
fn reset_reports_presence() {
    let mut uart = SimUart::new();
    assert!(!bus(&mut uart).reset().unwrap());
    uart.attach(SimDevice::new(ROM_A));
    let mut ow = bus(&mut uart);
    assert!(ow.reset().unwrap());
    assert_eq!(ow.baud_rate(), Some(BaudRate::Reset));
}

#[test]
fn excess_echo_bytes_do_not_change_the_outcome() {
    let mut uart = SimUart::new().with_device(SimDevice::new(ROM_A));
    let mut ow = bus(&mut uart);
    ow.reset().unwrap();
    drop(ow);
    for _ in 0..5 {
        uart.push_input(0x00);
    }
    let mut ow = UartOneWireBuilder::default()
        .with_drain(false)
        .build(&mut uart)
        .unwrap();
    let bits: Vec<bool> = (0..3).map(|_| ow.read_bit().unwrap()).collect();
    assert_eq!(bits, [true, true, true]);
}

#[test]
fn read_rom_of_a_single_device() {
    let mut uart = SimUart::new().with_device(SimDevice::new(ROM_A));
    assert_eq!(bus(&mut uart).read_rom().unwrap(), ROM_A);
}

#[test]
fn read_rom_collides_with_two_devices() {
    let mut uart = SimUart::new().with_devices([SimDevice::new(ROM_A), SimDevice::new(ROM_B)]);
    assert!(matches!(
        bus(&mut uart).read_rom(),
        Err(OneWireError::ChecksumMismatch)
    ));
}

#[test]
fn match_rom_selects_one_device() {
    let mut uart = SimUart::new().with_devices([
        SimDevice::new(ROM_A).with_parasite_power(true),
        SimDevice::new(ROM_B),
    ]);
    let mut ow = bus(&mut uart);
    ow.address(Some(ROM_B)).unwrap();
    ow.write_command(Command::ReadPowerSupply).unwrap();
    assert!(ow.read_bit().unwrap());
    ow.address(Some(ROM_A)).unwrap();
    ow.write_command(Command::ReadPowerSupply).unwrap();
    assert!(!ow.read_bit().unwrap());
    ow.address(None).unwrap();
    ow.write_command(Command::ReadPowerSupply).unwrap();
    assert!(!ow.read_bit().unwrap());
}

#[test]
fn addressing_an_empty_bus_fails() {
    let mut uart = SimUart::new();
    assert!(matches!(
        bus(&mut uart).address(Some(ROM_A)),
        Err(OneWireError::NoDevicePresent)
    ));
}

#[test]
fn write_bits_and_read_bits_run_in_order() {
    let mut uart = SimUart::new().with_device(SimDevice::new(ROM_A));
    let mut ow = bus(&mut uart);
    assert!(ow.reset().unwrap());
    ow.write_bits(
        (0..8).map(|i| Command::ReadRom.code() >> i & 1 == 1),
    )
    .unwrap();
    let bits: Vec<bool> = ow.read_bits(64).collect::<Result<_, _>>().unwrap();
    let rom = bits
        .iter()
        .enumerate()
        .fold(0u64, |rom, (i, &bit)| rom | u64::from(bit) << i);
    assert_eq!(rom, ROM_A);
}

#[test]
fn transport_errors_propagate() {
    let mut uart = SimUart::new().with_device(SimDevice::new(ROM_A));
    let mut ow = bus(&mut uart);
    assert!(ow.reset().unwrap());
    // 0x00 is not a ROM command the simulated devices know
    assert!(matches!(
        ow.write_byte(0x00),
        Err(OneWireError::Other(SimError::UnsupportedCommand(0x00)))
    ));
}
