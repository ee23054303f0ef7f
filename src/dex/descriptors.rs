use super::names::take_name_part;
use std::iter::Peekable;

/// Most dimensions an array type descriptor can have
pub const MAX_ARRAY_DIMENSIONS: usize = 255;

pub trait ParseDescriptor: Sized {
    /// Parse a descriptor from a sequence of UTF-16 code units
    fn parse(source: &[u16]) -> Result<Self, String> {
        let mut units = source.iter().copied().peekable();
        let ret = Self::parse_from(&mut units)?;
        match units.next() {
            None => Ok(ret),
            Some(unit) => Err(format!("Unexpected leftover input {:#06x}", unit)),
        }
    }

    /// Read the descriptor from a code unit buffer
    fn parse_from<I: Iterator<Item = u16>>(source: &mut Peekable<I>) -> Result<Self, String>;
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    /// Descriptor character, which is also the shorty character
    pub const fn to_char(self) -> char {
        match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        }
    }

    pub const fn from_char(c: char) -> Option<BaseType> {
        Some(match c {
            'B' => BaseType::Byte,
            'C' => BaseType::Char,
            'D' => BaseType::Double,
            'F' => BaseType::Float,
            'I' => BaseType::Int,
            'J' => BaseType::Long,
            'S' => BaseType::Short,
            'Z' => BaseType::Boolean,
            _ => return None,
        })
    }
}

impl ParseDescriptor for BaseType {
    fn parse_from<I: Iterator<Item = u16>>(source: &mut Peekable<I>) -> Result<Self, String> {
        match source.next() {
            Some(unit) => unit_to_char(unit)
                .and_then(BaseType::from_char)
                .ok_or_else(|| format!("Invalid base type character {:#06x}", unit)),
            None => Err(String::from("Missing base type character")),
        }
    }
}

/// Reference type
///
/// The verifier never needs the actual class name, only the fact that it is well-formed.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum RefType {
    Object,
    ObjectArray(ArrayType<()>),
    PrimitiveArray(ArrayType<BaseType>),
}

/// Generic array type
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ArrayType<T> {
    /// Additional dimensions (`A[]` has 0 additional dimensions, `A[][][][]` has 3)
    pub additional_dimensions: usize,

    /// Underlying element type (`A` is the underlying element type of `A[][]`)
    pub element_type: T,
}

/// Parse `L<class name>;`
fn parse_class_type<I: Iterator<Item = u16>>(source: &mut Peekable<I>) -> Result<(), String> {
    if source.next() != Some(b'L' as u16) {
        return Err(String::from("Expected object type to start with `L`"));
    }
    let mut component_start = true;
    loop {
        match source.peek().copied() {
            None => return Err(String::from("Missing `;` terminator for object type")),
            Some(unit) if unit == b';' as u16 => {
                source.next();
                return if component_start {
                    Err(String::from("Empty class name component"))
                } else {
                    Ok(())
                };
            }
            Some(unit) if unit == b'/' as u16 => {
                source.next();
                if component_start {
                    return Err(String::from("Empty class name component"));
                }
                component_start = true;
            }
            Some(unit) => {
                if !take_name_part(source) {
                    return Err(format!("Invalid class name character {:#06x}", unit));
                }
                component_start = false;
            }
        }
    }
}

impl ParseDescriptor for RefType {
    fn parse_from<I: Iterator<Item = u16>>(source: &mut Peekable<I>) -> Result<Self, String> {
        match source.peek().copied().and_then(unit_to_char) {
            Some('L') => parse_class_type(source).map(|()| RefType::Object),
            Some('[') => {
                let mut dimensions = 0;
                while source.next_if_eq(&(b'[' as u16)).is_some() {
                    dimensions += 1;
                }
                if dimensions > MAX_ARRAY_DIMENSIONS {
                    return Err(format!(
                        "Array type has {} dimensions, more than the {} allowed",
                        dimensions, MAX_ARRAY_DIMENSIONS
                    ));
                }
                let additional_dimensions = dimensions - 1;
                if source.peek() == Some(&(b'L' as u16)) {
                    parse_class_type(source)?;
                    Ok(RefType::ObjectArray(ArrayType {
                        additional_dimensions,
                        element_type: (),
                    }))
                } else {
                    Ok(RefType::PrimitiveArray(ArrayType {
                        additional_dimensions,
                        element_type: BaseType::parse_from(source)?,
                    }))
                }
            }
            Some(c) => Err(format!("Invalid reference type character '{}'", c)),
            None => Err(String::from("Missing reference type")),
        }
    }
}

/// Type of a field, parameter, or array element
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType {
    Base(BaseType),
    Ref(RefType),
}

impl FieldType {
    /// Shorty character summarizing this type
    pub const fn shorty_char(&self) -> char {
        match self {
            FieldType::Base(base_type) => base_type.to_char(),
            FieldType::Ref(_) => 'L',
        }
    }

    pub const fn is_class(&self) -> bool {
        matches!(self, FieldType::Ref(RefType::Object))
    }
}

impl ParseDescriptor for FieldType {
    fn parse_from<I: Iterator<Item = u16>>(source: &mut Peekable<I>) -> Result<Self, String> {
        match source.peek().copied().and_then(unit_to_char) {
            None => Err(String::from("Missing field type")),
            Some('B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z') => {
                BaseType::parse_from(source).map(FieldType::Base)
            }
            Some('L' | '[') => RefType::parse_from(source).map(FieldType::Ref),
            Some(c) => Err(format!("Invalid field type character '{}'", c)),
        }
    }
}

/// Any type a type id can name: a field type or `void`
///
/// `void` is only legal as a return type, but the type id table has no way of knowing where the
/// type will be used.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeDescriptor {
    Void,
    Field(FieldType),
}

impl TypeDescriptor {
    pub const fn shorty_char(&self) -> char {
        match self {
            TypeDescriptor::Void => 'V',
            TypeDescriptor::Field(field_type) => field_type.shorty_char(),
        }
    }

    pub const fn is_class(&self) -> bool {
        match self {
            TypeDescriptor::Void => false,
            TypeDescriptor::Field(field_type) => field_type.is_class(),
        }
    }
}

impl ParseDescriptor for TypeDescriptor {
    fn parse_from<I: Iterator<Item = u16>>(source: &mut Peekable<I>) -> Result<Self, String> {
        if source.next_if_eq(&(b'V' as u16)).is_some() {
            Ok(TypeDescriptor::Void)
        } else {
            FieldType::parse_from(source).map(TypeDescriptor::Field)
        }
    }
}

fn unit_to_char(unit: u16) -> Option<char> {
    if unit < 0x80 {
        Some(unit as u8 as char)
    } else {
        None
    }
}

/// Check that a type descriptor is summarized by a shorty character
///
/// Primitives (and `void`, for return types only) must match exactly, while every reference type
/// (class or array) is summarized by `L`.
pub fn check_shorty_match(
    shorty_char: u16,
    descriptor: &TypeDescriptor,
    is_return_type: bool,
) -> Result<(), String> {
    let shorty_char = match unit_to_char(shorty_char) {
        Some(c) => c,
        None => return Err(format!("Bad shorty character: {:#06x}", shorty_char)),
    };
    match shorty_char {
        'V' if !is_return_type => Err(String::from("Invalid use of void")),
        'V' | 'B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z' => {
            if descriptor.shorty_char() == shorty_char {
                Ok(())
            } else {
                Err(format!(
                    "Shorty vs. primitive type mismatch: '{}', '{:?}'",
                    shorty_char, descriptor
                ))
            }
        }
        'L' => {
            if matches!(descriptor, TypeDescriptor::Field(FieldType::Ref(_))) {
                Ok(())
            } else {
                Err(format!(
                    "Shorty vs. type mismatch: '{}', '{:?}'",
                    shorty_char, descriptor
                ))
            }
        }
        c => Err(format!("Bad shorty character: '{}'", c)),
    }
}
