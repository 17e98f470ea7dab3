//! Superset of every command the Melview protocol knows, across all hardware
//! variants. Entries carry the capability rule that gates them; the resolver
//! in [`crate::model`] filters this table down to a single unit.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Action category. Each one has its own wire prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Power,
    Mode,
    Temperature,
    Fan,
    AirDirectionV,
    AirDirectionH,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Power,
        Category::Mode,
        Category::Temperature,
        Category::Fan,
        Category::AirDirectionV,
        Category::AirDirectionH,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Power => "power",
            Category::Mode => "mode",
            Category::Temperature => "temperature",
            Category::Fan => "fan",
            Category::AirDirectionV => "vertical air direction",
            Category::AirDirectionH => "horizontal air direction",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability fields that gate catalog entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityFlag {
    FanStage,
    HasAirDir,
    HasSwing,
    HasAutoMode,
    HasAutoFan,
    HasDryMode,
    HasAirAuto,
    HasAirDirH,
}

impl CapabilityFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityFlag::FanStage => "fanstage",
            CapabilityFlag::HasAirDir => "hasairdir",
            CapabilityFlag::HasSwing => "hasswing",
            CapabilityFlag::HasAutoMode => "hasautomode",
            CapabilityFlag::HasAutoFan => "hasautofan",
            CapabilityFlag::HasDryMode => "hasdrymode",
            CapabilityFlag::HasAirAuto => "hasairauto",
            CapabilityFlag::HasAirDirH => "hasairdirh",
        }
    }
}

/// `(token, code)` pairs copied verbatim into a model.
pub type Mapping = &'static [(&'static str, &'static str)];

#[derive(Debug, Clone, Copy)]
pub struct Variant {
    pub key: i64,
    pub entries: Mapping,
}

#[derive(Debug, Clone, Copy)]
pub enum Filter {
    /// Single entry, present only when `flag == value`.
    Requires { flag: CapabilityFlag, value: i64 },
    /// The flag's value selects one of `variants`; its entries replace this one.
    Variant {
        flag: CapabilityFlag,
        variants: &'static [Variant],
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub token: &'static str,
    pub code: &'static str,
    pub filter: Option<Filter>,
}

#[derive(Debug, Clone, Copy)]
pub struct Section {
    pub category: Category,
    pub prefix: &'static str,
    pub entries: &'static [Entry],
}

const fn always(token: &'static str, code: &'static str) -> Entry {
    Entry {
        token,
        code,
        filter: None,
    }
}

const fn requires(token: &'static str, code: &'static str, flag: CapabilityFlag) -> Entry {
    Entry {
        token,
        code,
        filter: Some(Filter::Requires { flag, value: 1 }),
    }
}

const fn variant(token: &'static str, flag: CapabilityFlag, variants: &'static [Variant]) -> Entry {
    Entry {
        token,
        code: "",
        filter: Some(Filter::Variant { flag, variants }),
    }
}

const FAN_STAGES: &[Variant] = &[
    Variant {
        key: 1,
        entries: &[("1", "5")],
    },
    Variant {
        key: 2,
        entries: &[("1", "2"), ("2", "5")],
    },
    Variant {
        key: 3,
        entries: &[("1", "2"), ("2", "3"), ("3", "5")],
    },
    Variant {
        key: 4,
        entries: &[("1", "2"), ("2", "3"), ("3", "5"), ("4", "6")],
    },
    Variant {
        key: 5,
        entries: &[("1", "1"), ("2", "2"), ("3", "3"), ("4", "5"), ("5", "6")],
    },
];

const HORIZONTAL_LEVELS: &[Variant] = &[
    Variant {
        key: 1,
        entries: &[
            ("left", "1"),
            ("left-centre", "2"),
            ("centre", "3"),
            ("right-centre", "4"),
            ("right", "5"),
        ],
    },
    Variant {
        key: 2,
        entries: &[
            ("left", "1"),
            ("left-centre", "2"),
            ("centre", "3"),
            ("right-centre", "4"),
            ("right", "5"),
            ("split", "8"),
            ("swing", "12"),
        ],
    },
];

pub const CATALOG: &[Section] = &[
    Section {
        category: Category::Power,
        prefix: "PW",
        entries: &[always("on", "1"), always("off", "0")],
    },
    Section {
        category: Category::Mode,
        prefix: "MD",
        entries: &[
            always("heat", "1"),
            requires("dry", "2", CapabilityFlag::HasDryMode),
            always("cool", "3"),
            always("fan", "7"),
            requires("auto", "8", CapabilityFlag::HasAutoMode),
        ],
    },
    Section {
        category: Category::Temperature,
        prefix: "TS",
        entries: &[],
    },
    Section {
        category: Category::Fan,
        prefix: "FS",
        entries: &[
            requires("auto", "0", CapabilityFlag::HasAutoFan),
            variant("speed", CapabilityFlag::FanStage, FAN_STAGES),
        ],
    },
    Section {
        category: Category::AirDirectionV,
        prefix: "AV",
        entries: &[
            requires("auto", "0", CapabilityFlag::HasAirAuto),
            requires("1", "1", CapabilityFlag::HasAirDir),
            requires("2", "2", CapabilityFlag::HasAirDir),
            requires("3", "3", CapabilityFlag::HasAirDir),
            requires("4", "4", CapabilityFlag::HasAirDir),
            requires("5", "5", CapabilityFlag::HasAirDir),
            requires("swing", "7", CapabilityFlag::HasSwing),
        ],
    },
    Section {
        category: Category::AirDirectionH,
        prefix: "AH",
        entries: &[variant("position", CapabilityFlag::HasAirDirH, HORIZONTAL_LEVELS)],
    },
];
