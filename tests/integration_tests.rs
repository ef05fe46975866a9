// Integration tests entry point

#[allow(unused)]
#[allow(clippy::all)]
mod integration {
    mod scenario_test;
    mod staleness_test;
}
