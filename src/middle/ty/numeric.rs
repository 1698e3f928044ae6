use strum::{EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum NumericKind {
    Logical,
    Char,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Single,
    Double,
}

impl core::fmt::Display for NumericKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumericKind::Logical => write!(f, "logical"),
            NumericKind::Char => write!(f, "char"),
            NumericKind::Int8 => write!(f, "int8"),
            NumericKind::Int16 => write!(f, "int16"),
            NumericKind::Int32 => write!(f, "int32"),
            NumericKind::Int64 => write!(f, "int64"),
            NumericKind::UInt8 => write!(f, "uint8"),
            NumericKind::UInt16 => write!(f, "uint16"),
            NumericKind::UInt32 => write!(f, "uint32"),
            NumericKind::UInt64 => write!(f, "uint64"),
            NumericKind::Single => write!(f, "single"),
            NumericKind::Double => write!(f, "double"),
        }
    }
}

impl NumericKind {
    pub fn is_integer(self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    pub fn is_signed_integer(self) -> bool {
        matches!(
            self,
            NumericKind::Int8 | NumericKind::Int16 | NumericKind::Int32 | NumericKind::Int64
        )
    }

    pub fn is_unsigned_integer(self) -> bool {
        matches!(
            self,
            NumericKind::UInt8 | NumericKind::UInt16 | NumericKind::UInt32 | NumericKind::UInt64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, NumericKind::Single | NumericKind::Double)
    }

    pub fn bits(self) -> u32 {
        match self {
            NumericKind::Logical | NumericKind::Char | NumericKind::Int8 | NumericKind::UInt8 => 8,
            NumericKind::Int16 | NumericKind::UInt16 => 16,
            NumericKind::Int32 | NumericKind::UInt32 | NumericKind::Single => 32,
            NumericKind::Int64 | NumericKind::UInt64 | NumericKind::Double => 64,
        }
    }

    fn signed_with_bits(bits: u32) -> Self {
        match bits {
            0..=8 => NumericKind::Int8,
            9..=16 => NumericKind::Int16,
            17..=32 => NumericKind::Int32,
            _ => NumericKind::Int64,
        }
    }

    /// Whether every value of `self` is representable in `other`.
    pub fn fits_into(self, other: NumericKind) -> bool {
        if self == other {
            return true;
        }

        match (self, other) {
            (NumericKind::Logical, _) => other != NumericKind::Char,
            (NumericKind::Char, _) => (other.is_integer() && other.bits() > 8) || other.is_float(),
            (_, NumericKind::Logical | NumericKind::Char) => false,
            (a, b) if a.is_float() => b.is_float() && b.bits() >= a.bits(),
            (a, b) if b.is_float() => a.bits() < b.bits() || b == NumericKind::Double,
            (a, b) if a.is_signed_integer() => b.is_signed_integer() && b.bits() >= a.bits(),
            (a, b) if b.is_unsigned_integer() => b.bits() >= a.bits(),
            (a, b) => b.bits() > a.bits(),
        }
    }

    /// The smallest kind both sides widen to. Integers mixed with a float
    /// give the float.
    pub fn widen(self, other: NumericKind) -> NumericKind {
        if self.fits_into(other) {
            return other;
        }
        if other.fits_into(self) {
            return self;
        }

        match (self, other) {
            (a, b) if a.is_float() || b.is_float() => {
                if a == NumericKind::Double || b == NumericKind::Double {
                    NumericKind::Double
                } else {
                    NumericKind::Single
                }
            }
            // Mixed signedness: a signed integer wide enough for the unsigned side
            (a, b) => NumericKind::signed_with_bits(a.bits().max(b.bits()) * 2),
        }
    }

    /// The C spelling of the type.
    pub fn c_type(self) -> &'static str {
        match self {
            NumericKind::Logical => "bool",
            NumericKind::Char => "char",
            NumericKind::Int8 => "int8_t",
            NumericKind::Int16 => "int16_t",
            NumericKind::Int32 => "int32_t",
            NumericKind::Int64 => "int64_t",
            NumericKind::UInt8 => "uint8_t",
            NumericKind::UInt16 => "uint16_t",
            NumericKind::UInt32 => "uint32_t",
            NumericKind::UInt64 => "uint64_t",
            NumericKind::Single => "float",
            NumericKind::Double => "double",
        }
    }

    /// Short tag used to build instance names, e.g. `plus_i32_d`.
    pub fn small_id(self) -> &'static str {
        match self {
            NumericKind::Logical => "b",
            NumericKind::Char => "c",
            NumericKind::Int8 => "i8",
            NumericKind::Int16 => "i16",
            NumericKind::Int32 => "i32",
            NumericKind::Int64 => "i64",
            NumericKind::UInt8 => "u8",
            NumericKind::UInt16 => "u16",
            NumericKind::UInt32 => "u32",
            NumericKind::UInt64 => "u64",
            NumericKind::Single => "s",
            NumericKind::Double => "d",
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn widening() {
        use NumericKind::*;

        assert_eq!(Int8.widen(Int32), Int32);
        assert_eq!(Int32.widen(Double), Double);
        assert_eq!(Int32.widen(Single), Single);
        assert_eq!(Single.widen(Double), Double);
        assert_eq!(UInt8.widen(Int8), Int16);
        assert_eq!(UInt32.widen(Int32), Int64);
        assert_eq!(UInt8.widen(Int32), Int32);
        assert_eq!(Logical.widen(Int32), Int32);
        assert_eq!(Char.widen(Int16), Int16);
    }

    #[test]
    fn widen_is_symmetric() {
        for a in NumericKind::iter() {
            for b in NumericKind::iter() {
                assert_eq!(a.widen(b), b.widen(a), "{a} with {b}");
            }
        }
    }
}
