#[test]
fn kff_macros_ui() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/kff_error_pass.rs");
    t.pass("tests/ui/event_pass.rs");
    t.pass("tests/ui/subscriber_pass.rs");
}
