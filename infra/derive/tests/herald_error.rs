#[test]
fn herald_error_ui() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/herald_error_pass.rs");
}
