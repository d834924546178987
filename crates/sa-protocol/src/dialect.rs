//! Dialect registry
//!
//! Every supported analyzer family is a [`Dialect`] variant. The variant fixes
//! everything that does not change between connections: how the trace is
//! framed, how many points it carries, how many vertical divisions the
//! graticule has, and which identity query the instrument answers.

use crate::block::{BlockFormat, ByteOrder};

/// Instrument vendor family, which selects the identity grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Family {
    /// Tektronix 49x/271x/278x
    Tektronix,
    /// HP/Agilent legacy mnemonics
    HewlettPackard,
    /// Advantest R3xxx
    Advantest,
    /// Anritsu MS-series
    Anritsu,
    /// SCPI-speaking analyzers
    Scpi,
    /// USB direct-digital receiver (no bus identity)
    DirectDigital,
}

impl Family {
    /// Returns a human-readable name for the family
    pub fn name(&self) -> &'static str {
        match self {
            Family::Tektronix => "Tektronix",
            Family::HewlettPackard => "HP/Agilent",
            Family::Advantest => "Advantest",
            Family::Anritsu => "Anritsu",
            Family::Scpi => "SCPI",
            Family::DirectDigital => "Direct digital receiver",
        }
    }

    /// The identity query understood by instruments of this family
    pub fn identity_query(&self) -> Option<&'static str> {
        match self {
            Family::Tektronix | Family::HewlettPackard | Family::Advantest => Some("ID?"),
            Family::Anritsu | Family::Scpi => Some("*IDN?"),
            Family::DirectDigital => None,
        }
    }

    /// Parse a family selector as given on the command line
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag.to_ascii_lowercase().as_str() {
            "tek" | "tektronix" => Some(Family::Tektronix),
            "hp" | "agilent" | "keysight" => Some(Family::HewlettPackard),
            "adv" | "advantest" => Some(Family::Advantest),
            "anritsu" => Some(Family::Anritsu),
            "scpi" => Some(Family::Scpi),
            "ddr" | "usb" => Some(Family::DirectDigital),
            _ => None,
        }
    }
}

/// Numeric encoding of an SCPI trace block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScpiEncoding {
    /// `:FORM REAL,32`: IEEE-754 single precision dBm
    Real32,
    /// `:FORM INT,32`: signed integer milli-dBm
    Int32Milli,
}

/// Layout of an SCPI trace block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScpiFormat {
    /// Sample encoding
    pub encoding: ScpiEncoding,
    /// Byte order selected at configure time
    pub order: ByteOrder,
}

/// Protocol shape used to trigger and retrieve one sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// (a) Echoed curve ID, 2-byte count, raw bytes, checksum; scaled by a cached preamble
    CachedPreamble,
    /// (b) Fixed-size block of display codes
    FixedBlock(BlockFormat),
    /// (c) Fixed-size block released once a status bit is seen by serial poll
    SerialPollGated {
        /// Block layout
        block: BlockFormat,
        /// Status byte bit(s) that signal sweep completion
        done_mask: u8,
    },
    /// (d) IEEE-488.2 length-prefixed block
    ScpiBlock(ScpiFormat),
    /// Samples delivered in dBm by the receiver backend
    DirectReceiver,
}

/// Static capabilities of a dialect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DialectCaps {
    /// Display name
    pub name: &'static str,
    /// Vendor family
    pub family: Family,
    /// Acquisition shape
    pub shape: Shape,
    /// Allowed trace point counts; empty means "read from the instrument"
    pub point_counts: &'static [usize],
    /// Vertical graticule divisions
    pub division_count: u32,
}

/// Supported analyzer dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dialect {
    /// Tektronix 490/2750 series
    Tek490,
    /// Tektronix 2710/2711/2712
    Tek2710,
    /// Tektronix 2780 series
    Tek2780,
    /// HP 8566A/B and 8568A/B
    Hp8566,
    /// HP 8560 E-series and EC-series
    Hp8560,
    /// HP 8590 series
    Hp8590,
    /// HP 70000 modular analyzers
    Hp70000,
    /// HP 3585A/B
    Hp3585,
    /// HP 3588A/3589A
    Hp358x,
    /// HP 8569B
    Hp8569b,
    /// Advantest R3261/R3361
    AdvantestR3261,
    /// Advantest R3265/R3271/R3465
    AdvantestR3265,
    /// Advantest R3267/R3273/R3264
    AdvantestR3267,
    /// Anritsu MS8604A
    AnritsuMs8604a,
    /// Anritsu MS2650 series
    AnritsuMs265x,
    /// Anritsu MS2660 series
    AnritsuMs266x,
    /// Generic SCPI analyzer
    Scpi,
    /// Rohde & Schwarz FSE
    RsFse,
    /// Rohde & Schwarz FSU/FSQ
    RsFsu,
    /// Rohde & Schwarz FSP
    RsFsp,
    /// Agilent E4406A VSA
    AgilentE4406a,
    /// Agilent N9900 (FieldFox)
    AgilentN9900,
    /// Self-configuring USB direct-digital receiver
    DirectReceiver,
}

/// Every dialect, in registry order
pub const ALL_DIALECTS: &[Dialect] = &[
    Dialect::Tek490,
    Dialect::Tek2710,
    Dialect::Tek2780,
    Dialect::Hp8566,
    Dialect::Hp8560,
    Dialect::Hp8590,
    Dialect::Hp70000,
    Dialect::Hp3585,
    Dialect::Hp358x,
    Dialect::Hp8569b,
    Dialect::AdvantestR3261,
    Dialect::AdvantestR3265,
    Dialect::AdvantestR3267,
    Dialect::AnritsuMs8604a,
    Dialect::AnritsuMs265x,
    Dialect::AnritsuMs266x,
    Dialect::Scpi,
    Dialect::RsFse,
    Dialect::RsFsu,
    Dialect::RsFsp,
    Dialect::AgilentE4406a,
    Dialect::AgilentN9900,
    Dialect::DirectReceiver,
];

const fn real32(order: ByteOrder) -> Shape {
    Shape::ScpiBlock(ScpiFormat {
        encoding: ScpiEncoding::Real32,
        order,
    })
}

const fn int32_milli() -> Shape {
    Shape::ScpiBlock(ScpiFormat {
        encoding: ScpiEncoding::Int32Milli,
        order: ByteOrder::BigEndian,
    })
}

impl Dialect {
    /// Static capabilities of this dialect
    pub fn caps(&self) -> DialectCaps {
        use Dialect::*;

        let (name, family, shape, point_counts, division_count): (
            &'static str,
            Family,
            Shape,
            &'static [usize],
            u32,
        ) = match self {
            Tek490 => ("Tektronix 490", Family::Tektronix, Shape::CachedPreamble, &[1000], 8),
            Tek2710 => ("Tektronix 2710", Family::Tektronix, Shape::CachedPreamble, &[512], 8),
            Tek2780 => ("Tektronix 2780", Family::Tektronix, Shape::CachedPreamble, &[1024], 8),
            Hp8566 => (
                "HP 8566/8568",
                Family::HewlettPackard,
                Shape::FixedBlock(BlockFormat::words(1000.0, -1.0)),
                &[1001],
                10,
            ),
            Hp8560 => (
                "HP 8560",
                Family::HewlettPackard,
                Shape::FixedBlock(BlockFormat::words(600.0, 0.0)),
                &[601],
                10,
            ),
            Hp8590 => (
                "HP 8590",
                Family::HewlettPackard,
                Shape::FixedBlock(BlockFormat::words(8000.0, 0.0)),
                &[401],
                10,
            ),
            Hp70000 => (
                "HP 70000",
                Family::HewlettPackard,
                Shape::FixedBlock(BlockFormat::words(8000.0, 0.0)),
                &[800],
                10,
            ),
            Hp3585 => (
                "HP 3585",
                Family::HewlettPackard,
                Shape::SerialPollGated {
                    block: BlockFormat::words(1000.0, 0.0),
                    done_mask: 0x04,
                },
                &[1001],
                10,
            ),
            Hp358x => (
                "HP 3588/3589",
                Family::HewlettPackard,
                Shape::SerialPollGated {
                    block: BlockFormat::words(8000.0, 0.0),
                    done_mask: 0x10,
                },
                &[401],
                10,
            ),
            Hp8569b => (
                "HP 8569B",
                Family::HewlettPackard,
                Shape::FixedBlock(BlockFormat::bytes(250.0, 0.0)),
                &[481],
                10,
            ),
            AdvantestR3261 => (
                "Advantest R3261",
                Family::Advantest,
                Shape::SerialPollGated {
                    block: BlockFormat::words(400.0, 0.0),
                    done_mask: 0x04,
                },
                &[701],
                10,
            ),
            AdvantestR3265 => (
                "Advantest R3265",
                Family::Advantest,
                Shape::SerialPollGated {
                    block: BlockFormat::words(800.0, 0.0),
                    done_mask: 0x04,
                },
                &[1001],
                10,
            ),
            AdvantestR3267 => (
                "Advantest R3267",
                Family::Advantest,
                Shape::SerialPollGated {
                    block: BlockFormat::words(800.0, 0.0),
                    done_mask: 0x04,
                },
                &[1001, 501],
                10,
            ),
            AnritsuMs8604a => (
                "Anritsu MS8604A",
                Family::Anritsu,
                Shape::FixedBlock(BlockFormat::words(10000.0, 0.0)),
                &[501],
                10,
            ),
            AnritsuMs265x => ("Anritsu MS2650", Family::Anritsu, int32_milli(), &[501, 1002], 10),
            AnritsuMs266x => ("Anritsu MS2660", Family::Anritsu, int32_milli(), &[501, 1002], 10),
            Scpi => ("Generic SCPI", Family::Scpi, real32(ByteOrder::LittleEndian), &[], 10),
            RsFse => ("R&S FSE", Family::Scpi, real32(ByteOrder::BigEndian), &[500], 10),
            RsFsu => ("R&S FSU", Family::Scpi, real32(ByteOrder::LittleEndian), &[625], 10),
            RsFsp => ("R&S FSP", Family::Scpi, real32(ByteOrder::LittleEndian), &[501], 10),
            AgilentE4406a => ("Agilent E4406A", Family::Scpi, real32(ByteOrder::BigEndian), &[], 10),
            AgilentN9900 => ("Agilent N9900", Family::Scpi, real32(ByteOrder::LittleEndian), &[], 10),
            DirectReceiver => (
                "Direct digital receiver",
                Family::DirectDigital,
                Shape::DirectReceiver,
                &[],
                10,
            ),
        };

        DialectCaps {
            name,
            family,
            shape,
            point_counts,
            division_count,
        }
    }

    /// Returns a human-readable name for the dialect
    pub fn name(&self) -> &'static str {
        self.caps().name
    }

    /// Vendor family of this dialect
    pub fn family(&self) -> Family {
        self.caps().family
    }

    /// Identity query for this dialect's family
    pub fn identity_query(&self) -> Option<&'static str> {
        self.family().identity_query()
    }

    /// Fixed point count, if the dialect supports exactly one
    pub fn fixed_point_count(&self) -> Option<usize> {
        match self.caps().point_counts {
            [n] => Some(*n),
            _ => None,
        }
    }

    /// Flag name used to force-select this dialect
    pub fn flag(&self) -> &'static str {
        use Dialect::*;
        match self {
            Tek490 => "tek490",
            Tek2710 => "tek2710",
            Tek2780 => "tek2780",
            Hp8566 => "hp8566",
            Hp8560 => "hp8560",
            Hp8590 => "hp8590",
            Hp70000 => "hp70000",
            Hp3585 => "hp3585",
            Hp358x => "hp358x",
            Hp8569b => "hp8569b",
            AdvantestR3261 => "r3261",
            AdvantestR3265 => "r3265",
            AdvantestR3267 => "r3267",
            AnritsuMs8604a => "ms8604a",
            AnritsuMs265x => "ms265x",
            AnritsuMs266x => "ms266x",
            Scpi => "scpi",
            RsFse => "fse",
            RsFsu => "fsu",
            RsFsp => "fsp",
            AgilentE4406a => "e4406a",
            AgilentN9900 => "n9900",
            DirectReceiver => "ddr",
        }
    }

    /// Parse a dialect flag (case-insensitive)
    pub fn from_flag(flag: &str) -> Option<Self> {
        let flag = flag.to_ascii_lowercase();
        ALL_DIALECTS.iter().copied().find(|d| d.flag() == flag)
    }
}
