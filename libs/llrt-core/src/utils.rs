pub const fn align_size(bytes: usize, byte_alignment: usize) -> usize {
	let remainder = bytes % byte_alignment;
	if remainder == 0 {
		bytes // Already aligned
	} else {
		bytes + byte_alignment - remainder
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn align_size_test() {
		assert_eq!(align_size(0, 8), 0);
		assert_eq!(align_size(3, 1), 3);
		assert_eq!(align_size(3, 2), 4);
		assert_eq!(align_size(3, 3), 3);
		assert_eq!(align_size(3, 4), 4);
		assert_eq!(align_size(3, 8), 8);
		assert_eq!(align_size(17, 8), 24);
	}
}
