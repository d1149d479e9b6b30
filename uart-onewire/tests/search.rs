use std::collections::BTreeSet;
use std::time::Duration;

use onewire_sim::{SimDevice, SimError, SimUart, rom_with_crc};
use proptest::prelude::*;
use rand::{SeedableRng, rngs::StdRng};
use uart_onewire::{
    BaudRate, OneWire, OneWireCrc, OneWireError, OneWireSearch, OneWireSearchKind, Transport,
    UartOneWire, UartOneWireBuilder,
};

const CELLAR: [u64; 3] = [0x2b0000047ff88528, 0x4e0000047fae9428, 0x5400000480970528];

const HOUSE: [u64; 12] = [
    0x2b0000047ff88528,
    0x4e0000047fae9428,
    0x5400000480970528,
    0x570000047fedf828,
    0xca0000047ff8df28,
    0x3b00000480a27d28,
    0x580000047ffbdb28,
    0x630000047ff26128,
    0x7d000004807d2e28,
    0xf60000047ff5b128,
    0xa80000047fa59d28,
    0x5f0000047fee9f28,
];

fn bus(uart: &mut SimUart) -> UartOneWire<&mut SimUart> {
    UartOneWireBuilder::default()
        .with_timeout(Duration::ZERO)
        .build(uart)
        .unwrap()
}

fn sorted(roms: &[u64]) -> Vec<u64> {
    let mut roms = roms.to_vec();
    roms.sort_unstable();
    roms
}

/// A line where something answers the reset pulse but nothing takes part in a search.
struct Mute(Option<BaudRate>);

impl Transport for Mute {
    type Error = SimError;

    fn write(&mut self, _bytes: &[u8]) -> Result<(), SimError> {
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, SimError> {
        buf[0] = match self.0 {
            Some(BaudRate::Reset) => 0xe0,
            _ => 0xff,
        };
        Ok(1)
    }

    fn set_baud_rate(&mut self, rate: BaudRate) -> Result<(), SimError> {
        self.0 = Some(rate);
        Ok(())
    }
}

impl Mute {
    fn bus() -> UartOneWire<Mute> {
        UartOneWireBuilder::default()
            .with_drain(false)
            .build(Mute(None))
            .unwrap()
    }
}

#[test]
fn finds_the_three_cellar_sensors() {
    let mut uart = SimUart::new().with_devices(CELLAR.map(SimDevice::new));
    let found = bus(&mut uart).search(false).unwrap();
    assert_eq!(sorted(&found), sorted(&CELLAR));
}

#[test]
fn attachment_order_does_not_matter() {
    let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
    for order in orders {
        let mut uart = SimUart::new().with_devices(order.map(|i| SimDevice::new(CELLAR[i])));
        let found = bus(&mut uart).search(false).unwrap();
        assert_eq!(sorted(&found), sorted(&CELLAR), "order {order:?}");
    }
}

#[test]
fn finds_every_sensor_in_the_house() {
    let mut uart = SimUart::new().with_devices(HOUSE.map(SimDevice::new));
    let mut ow = bus(&mut uart);
    let first = ow.search(false).unwrap();
    let second = ow.search(false).unwrap();
    assert_eq!(first.len(), HOUSE.len());
    assert_eq!(sorted(&first), sorted(&HOUSE));
    assert_eq!(first, second);
    drop(ow);
    // one reset per device, nothing more
    assert_eq!(uart.resets(), 2 * HOUSE.len());
}

#[test]
fn empty_bus_is_not_an_error() {
    let mut uart = SimUart::new();
    assert!(bus(&mut uart).search(false).unwrap().is_empty());
    assert!(bus(&mut uart).search(true).unwrap().is_empty());
}

#[test]
fn losing_presence_ends_the_search_early() {
    let devices = CELLAR.map(|rom| SimDevice::new(rom).with_reset_limit(2));
    let mut uart = SimUart::new().with_devices(devices);
    let found = bus(&mut uart).search(false).unwrap();
    assert_eq!(found.len(), 2);
    assert_ne!(found[0], found[1]);
    assert!(found.iter().all(|rom| CELLAR.contains(rom)));
    assert_eq!(uart.resets(), 3);
}

#[test]
fn next_returns_none_after_presence_is_lost() {
    let mut uart = SimUart::new().with_devices([
        SimDevice::new(CELLAR[0]).with_reset_limit(1),
        SimDevice::new(CELLAR[1]).with_reset_limit(1),
    ]);
    let mut ow = bus(&mut uart);
    let mut search = OneWireSearch::new(&mut ow, OneWireSearchKind::Normal);
    let first = search.next().unwrap().unwrap();
    assert!(first == CELLAR[0] || first == CELLAR[1]);
    assert_ne!(search.mask(), 0);
    assert_eq!(search.next().unwrap(), None);
    assert_eq!(search.next().unwrap(), None);
}

#[test]
fn next_returns_none_once_exhausted() {
    let mut uart = SimUart::new().with_device(SimDevice::new(CELLAR[0]));
    let mut ow = bus(&mut uart);
    let mut search = OneWireSearch::new(&mut ow, OneWireSearchKind::Normal);
    assert_eq!(search.next().unwrap(), Some(CELLAR[0]));
    assert_eq!(search.mask(), 0);
    assert_eq!(search.next().unwrap(), None);
    assert_eq!(search.next().unwrap(), None);
    search.restart();
    assert_eq!(search.next().unwrap(), Some(CELLAR[0]));
}

#[test]
fn bad_crc_rolls_back_and_retries() {
    let devices = CELLAR.map(|rom| SimDevice::new(rom).with_crc_glitches(1));
    let mut uart = SimUart::new().with_devices(devices);
    let found = bus(&mut uart).search(false).unwrap();
    assert_eq!(sorted(&found), sorted(&CELLAR));
    assert!(found.iter().all(|&rom| OneWireCrc::validate_rom(rom)));
    // the glitched pass is repeated once
    assert_eq!(uart.resets(), CELLAR.len() + 1);
}

#[test]
fn persistent_bad_crc_gives_up() {
    let broken = CELLAR[0] ^ 1 << 60;
    let mut uart = SimUart::new().with_device(SimDevice::new(broken));
    let mut ow = bus(&mut uart);
    let res = OneWireSearch::new(&mut ow, OneWireSearchKind::Normal)
        .with_max_crc_retries(3)
        .collect_all();
    assert!(matches!(res, Err(OneWireError::ChecksumMismatch)));
    drop(ow);
    assert_eq!(uart.resets(), 4);
}

#[test]
fn silent_search_is_a_protocol_violation() {
    let res = Mute::bus().search(false);
    assert!(matches!(
        res,
        Err(OneWireError::ProtocolViolation { position: 0 })
    ));
}

#[test]
fn silent_alarm_search_is_empty() {
    assert!(Mute::bus().search(true).unwrap().is_empty());
}

#[test]
fn alarm_search_only_finds_alarmed_devices() {
    let mut uart = SimUart::new().with_devices([
        SimDevice::new(CELLAR[0]),
        SimDevice::new(CELLAR[1]).with_alarm(true),
        SimDevice::new(CELLAR[2]).with_alarm(true),
    ]);
    let mut ow = bus(&mut uart);
    assert_eq!(sorted(&ow.search(true).unwrap()), sorted(&CELLAR[1..]));
    assert_eq!(ow.search(false).unwrap().len(), 3);
}

#[test]
fn alarm_search_without_alarms_is_empty() {
    let mut uart = SimUart::new().with_devices(CELLAR.map(SimDevice::new));
    assert!(bus(&mut uart).search(true).unwrap().is_empty());
}

#[test]
fn random_population() {
    let mut rng = StdRng::seed_from_u64(0x28);
    let devices: Vec<_> = (0..40).map(|_| SimDevice::random(&mut rng, 0x28)).collect();
    let expected: BTreeSet<_> = devices.iter().map(SimDevice::rom).collect();
    let mut uart = SimUart::new().with_devices(devices);
    let found = bus(&mut uart).search(false).unwrap();
    assert_eq!(found.len(), expected.len());
    assert_eq!(found.into_iter().collect::<BTreeSet<_>>(), expected);
}

proptest! {
    #[test]
    fn search_finds_exactly_the_attached_devices(
        family in any::<u8>(),
        serials in prop::collection::btree_set(0u64..1 << 48, 0..16),
        glitched in prop::collection::vec(any::<bool>(), 16),
    ) {
        let roms: Vec<u64> = serials.iter().map(|&s| rom_with_crc(family, s)).collect();
        let devices = roms
            .iter()
            .zip(glitched.iter())
            .map(|(&rom, &glitch)| SimDevice::new(rom).with_crc_glitches(u32::from(glitch)));
        let mut uart = SimUart::new().with_devices(devices);
        let mut ow = bus(&mut uart);
        let found = ow.search(false).unwrap();
        prop_assert_eq!(sorted(&found), sorted(&roms));
        prop_assert!(found.iter().all(|&rom| OneWireCrc::validate_rom(rom)));
        prop_assert_eq!(ow.search(false).unwrap(), found);
    }
}
