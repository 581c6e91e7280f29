#[test]
fn subscriber_ui() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/subscriber_pass.rs");
}
