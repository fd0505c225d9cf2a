use std::fmt;
use std::str::FromStr;

/// InfluxDB measurement (table) the forwarder writes to.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Measurement {
    /// Latest published consumption values
    Consumption,
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Measurement::Consumption => write!(f, "consumption"),
        }
    }
}

/// Utility category tracked by the provider.
///
/// The `Display` form is the provider's own spelling, which is also the
/// key used in consumption payloads.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Category {
    Water,
    Electricity,
    Heating,
    Other,
}

impl Category {
    /// Every category, in the order the coordinator fetches them.
    pub const ALL: [Category; 4] = [
        Category::Water,
        Category::Electricity,
        Category::Heating,
        Category::Other,
    ];

    /// Allocation unit code used by the consumption endpoint.
    pub fn allocation_unit(&self) -> &'static str {
        match self {
            Category::Water => "W",
            Category::Electricity => "E",
            Category::Heating => "H",
            Category::Other => "O",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Category::Water => write!(f, "Water"),
            Category::Electricity => write!(f, "Electricity"),
            Category::Heating => write!(f, "Heating"),
            Category::Other => write!(f, "Other"),
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Water" => Ok(Category::Water),
            "Electricity" => Ok(Category::Electricity),
            "Heating" => Ok(Category::Heating),
            "Other" => Ok(Category::Other),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

/// Time bucketing of a consumption series.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Granularity {
    Day,
    Month,
}

impl Granularity {
    /// Interval code used by the consumption endpoint.
    pub fn interval(&self) -> &'static str {
        match self {
            Granularity::Day => "D",
            Granularity::Month => "M",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Granularity::Day => write!(f, "Day"),
            Granularity::Month => write!(f, "Month"),
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Day" => Ok(Granularity::Day),
            "Month" => Ok(Granularity::Month),
            other => Err(format!("unknown granularity '{}'", other)),
        }
    }
}

/// How to reduce a category holding more than one meter to one value.
///
/// Which rule the household actually wants is undecided, so the rule is
/// explicit and configurable. `FirstListed` reproduces the long-standing
/// behavior: the first meter the provider lists that has any reading.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub enum TieBreak {
    #[default]
    FirstListed,
    /// The reading with the latest date across all meters
    MostRecent,
    /// Sum of each meter's latest reading
    Sum,
    /// Only the meter with this id
    Meter(String),
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TieBreak::FirstListed => write!(f, "first"),
            TieBreak::MostRecent => write!(f, "latest"),
            TieBreak::Sum => write!(f, "sum"),
            TieBreak::Meter(id) => write!(f, "meter:{}", id),
        }
    }
}

impl FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "first" => Ok(TieBreak::FirstListed),
            "latest" => Ok(TieBreak::MostRecent),
            "sum" => Ok(TieBreak::Sum),
            other => match other.strip_prefix("meter:") {
                Some(id) if !id.trim().is_empty() => Ok(TieBreak::Meter(id.trim().to_string())),
                _ => Err(format!("unknown tie-break '{}'", other)),
            },
        }
    }
}
