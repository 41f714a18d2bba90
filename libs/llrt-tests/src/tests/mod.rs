
#[test]
fn sample_keeps_every_result() {
	llrt_core::init();
	let results = crate::sample("Squares", 4, |i| i * i);
	assert_eq!(results, [0, 1, 4, 9]);
}
