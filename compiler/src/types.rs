// types.rs — Port data types: concrete types, abstract declarations, domains
//
// A declared port type may be abstract ("any", "any_float", ...). During
// concretization every port is narrowed to exactly one `ConcreteType`; the
// set of candidates still open for a port is a `Domain` bitset.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: unknown type names fail `DeclaredType::from_str`.
// Side effects: none.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Concrete types ─────────────────────────────────────────────────────────

/// A fully resolved runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConcreteType {
    Float,
    Float2,
    Float3,
    Float4,
    Int,
    Bool,
    /// Sampled texture with `dim` in 1..=3 and `size` float elements in 1..=4.
    Texture { dim: u8, size: u8 },
}

impl ConcreteType {
    pub const COUNT: u32 = 18;

    /// Rank order: also the order used when an isolated port is defaulted.
    pub fn index(self) -> u32 {
        match self {
            ConcreteType::Float => 0,
            ConcreteType::Float2 => 1,
            ConcreteType::Float3 => 2,
            ConcreteType::Float4 => 3,
            ConcreteType::Int => 4,
            ConcreteType::Bool => 5,
            ConcreteType::Texture { dim, size } => {
                6 + (u32::from(dim) - 1) * 4 + (u32::from(size) - 1)
            }
        }
    }

    pub fn from_index(index: u32) -> Option<ConcreteType> {
        Some(match index {
            0 => ConcreteType::Float,
            1 => ConcreteType::Float2,
            2 => ConcreteType::Float3,
            3 => ConcreteType::Float4,
            4 => ConcreteType::Int,
            5 => ConcreteType::Bool,
            6..=17 => ConcreteType::Texture {
                dim: ((index - 6) / 4 + 1) as u8,
                size: ((index - 6) % 4 + 1) as u8,
            },
            _ => return None,
        })
    }

    /// The float vector (or scalar) with `size` components.
    pub fn float_vector(size: u8) -> Option<ConcreteType> {
        match size {
            1 => Some(ConcreteType::Float),
            2 => Some(ConcreteType::Float2),
            3 => Some(ConcreteType::Float3),
            4 => Some(ConcreteType::Float4),
            _ => None,
        }
    }

    pub fn texture(dim: u8, size: u8) -> Option<ConcreteType> {
        if (1..=3).contains(&dim) && (1..=4).contains(&size) {
            Some(ConcreteType::Texture { dim, size })
        } else {
            None
        }
    }

    /// Number of components; textures report their element size.
    pub fn composite_size(self) -> u8 {
        match self {
            ConcreteType::Float | ConcreteType::Int | ConcreteType::Bool => 1,
            ConcreteType::Float2 => 2,
            ConcreteType::Float3 => 3,
            ConcreteType::Float4 => 4,
            ConcreteType::Texture { size, .. } => size,
        }
    }

    /// Coordinate dimensionality: a texture's dimension, a vector's size.
    pub fn dimensionality(self) -> u8 {
        match self {
            ConcreteType::Texture { dim, .. } => dim,
            other => other.composite_size(),
        }
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            ConcreteType::Float | ConcreteType::Float2 | ConcreteType::Float3 | ConcreteType::Float4
        )
    }

    pub fn is_texture(self) -> bool {
        matches!(self, ConcreteType::Texture { .. })
    }
}

impl fmt::Display for ConcreteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcreteType::Float => write!(f, "float"),
            ConcreteType::Float2 => write!(f, "float2"),
            ConcreteType::Float3 => write!(f, "float3"),
            ConcreteType::Float4 => write!(f, "float4"),
            ConcreteType::Int => write!(f, "int"),
            ConcreteType::Bool => write!(f, "bool"),
            ConcreteType::Texture { dim, size: 1 } => write!(f, "texture{dim}d_float"),
            ConcreteType::Texture { dim, size } => write!(f, "texture{dim}d_float{size}"),
        }
    }
}

// ── Declared types ─────────────────────────────────────────────────────────

/// A port's declared type as it arrives from the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeclaredType {
    Any,
    AnyFloat,
    AnyFloat123,
    AnyTexture,
    Concrete(ConcreteType),
}

impl DeclaredType {
    /// Candidate concrete types for a port declared with this type.
    pub fn domain(self) -> Domain {
        match self {
            DeclaredType::Any => Domain::VALUES,
            DeclaredType::AnyFloat => Domain::FLOATS,
            DeclaredType::AnyFloat123 => Domain::FLOATS123,
            DeclaredType::AnyTexture => Domain::TEXTURES,
            DeclaredType::Concrete(t) => Domain::of(t),
        }
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclaredType::Any => write!(f, "any"),
            DeclaredType::AnyFloat => write!(f, "any_float"),
            DeclaredType::AnyFloat123 => write!(f, "any_float123"),
            DeclaredType::AnyTexture => write!(f, "any_texture"),
            DeclaredType::Concrete(t) => write!(f, "{t}"),
        }
    }
}

impl FromStr for DeclaredType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" => return Ok(DeclaredType::Any),
            "any_float" => return Ok(DeclaredType::AnyFloat),
            "any_float123" => return Ok(DeclaredType::AnyFloat123),
            "any_texture" => return Ok(DeclaredType::AnyTexture),
            _ => {}
        }
        (0..ConcreteType::COUNT)
            .filter_map(ConcreteType::from_index)
            .find(|t| t.to_string() == s)
            .map(DeclaredType::Concrete)
            .ok_or_else(|| format!("unknown data type '{s}'"))
    }
}

impl TryFrom<String> for DeclaredType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeclaredType> for String {
    fn from(value: DeclaredType) -> Self {
        value.to_string()
    }
}

// ── Domains ────────────────────────────────────────────────────────────────

/// A set of concrete types, one bit per `ConcreteType::index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Domain(pub u32);

impl Domain {
    pub const EMPTY: Domain = Domain(0);
    pub const FLOATS: Domain = Domain(0b1111);
    pub const FLOATS123: Domain = Domain(0b0111);
    pub const NUMERIC: Domain = Domain(0b1_1111);
    pub const VALUES: Domain = Domain(0b11_1111);
    pub const TEXTURES: Domain = Domain(0b1111_1111_1111 << 6);
    pub const ALL: Domain = Domain((1 << ConcreteType::COUNT) - 1);

    pub fn of(t: ConcreteType) -> Domain {
        Domain(1 << t.index())
    }

    pub fn contains(self, t: ConcreteType) -> bool {
        self.0 & (1 << t.index()) != 0
    }

    pub fn intersect(self, other: Domain) -> Domain {
        Domain(self.0 & other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// The only member, if exactly one remains.
    pub fn single(self) -> Option<ConcreteType> {
        if self.len() == 1 {
            ConcreteType::from_index(self.0.trailing_zeros())
        } else {
            None
        }
    }

    /// Lowest-ranked member.
    pub fn first(self) -> Option<ConcreteType> {
        if self.is_empty() {
            None
        } else {
            ConcreteType::from_index(self.0.trailing_zeros())
        }
    }

    pub fn iter(self) -> impl Iterator<Item = ConcreteType> {
        (0..ConcreteType::COUNT)
            .filter(move |i| self.0 & (1 << i) != 0)
            .filter_map(ConcreteType::from_index)
    }

    /// Members satisfying `keep`.
    pub fn filter(self, keep: impl Fn(ConcreteType) -> bool) -> Domain {
        Domain(self.iter().filter(|t| keep(*t)).fold(0, |acc, t| acc | (1 << t.index())))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|t| t.to_string()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
