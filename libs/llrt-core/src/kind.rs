use std::fmt::{Display, Formatter};
use std::mem::size_of;

/// The element category of an array, as passed by generated code.
///
/// The discriminants are the tags generated code uses when it asks for a new array.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum Kind {
	Boolean = 0,
	Byte = 1,
	Short = 2,
	Char = 3,
	Int = 4,
	Long = 5,
	Float = 6,
	Double = 7,
	Reference = 8,
}

impl Kind {
	pub const PRIMITIVES: [Kind; 8] = [
		Kind::Boolean,
		Kind::Byte,
		Kind::Short,
		Kind::Char,
		Kind::Int,
		Kind::Long,
		Kind::Float,
		Kind::Double,
	];

	pub fn from_tag(tag: u8) -> Option<Kind> {
		Some(match tag {
			0 => Kind::Boolean,
			1 => Kind::Byte,
			2 => Kind::Short,
			3 => Kind::Char,
			4 => Kind::Int,
			5 => Kind::Long,
			6 => Kind::Float,
			7 => Kind::Double,
			8 => Kind::Reference,
			_ => return None,
		})
	}

	/// Width of one array element of this kind. References are stored as a
	/// dispatch table pointer next to the object pointer.
	pub fn size(&self) -> usize {
		match self {
			Kind::Boolean => size_of::<bool>(),
			Kind::Byte => size_of::<i8>(),
			Kind::Short => size_of::<i16>(),
			Kind::Char => size_of::<u16>(),
			Kind::Int => size_of::<i32>(),
			Kind::Long => size_of::<i64>(),
			Kind::Float => size_of::<f32>(),
			Kind::Double => size_of::<f64>(),
			Kind::Reference => size_of::<[usize; 2]>(),
		}
	}

	pub fn align(&self) -> usize {
		match self {
			Kind::Reference => size_of::<usize>(),
			_ => self.size(),
		}
	}

	pub fn is_ref(&self) -> bool {
		matches!(self, Kind::Reference)
	}
}

impl Display for Kind {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Kind::Boolean => f.write_str("boolean"),
			Kind::Byte => f.write_str("byte"),
			Kind::Short => f.write_str("short"),
			Kind::Char => f.write_str("char"),
			Kind::Int => f.write_str("int"),
			Kind::Long => f.write_str("long"),
			Kind::Float => f.write_str("float"),
			Kind::Double => f.write_str("double"),
			Kind::Reference => f.write_str("Object"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tags() {
		for kind in Kind::PRIMITIVES {
			assert_eq!(Kind::from_tag(kind as u8), Some(kind));
		}
		assert_eq!(Kind::from_tag(8), Some(Kind::Reference));
		assert_eq!(Kind::from_tag(9), None);
	}

	#[test]
	fn widths() {
		assert_eq!(Kind::Boolean.size(), 1);
		assert_eq!(Kind::Char.size(), 2);
		assert_eq!(Kind::Long.size(), 8);
		assert_eq!(Kind::Reference.size(), 2 * size_of::<usize>());
		assert_eq!(Kind::Reference.align(), size_of::<usize>());
	}
}
