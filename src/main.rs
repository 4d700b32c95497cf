fn main() {
    let config = flocon_orders_lib::config::Config::new()
        .expect("Failed to load service configuration. Please check your 'config' folder");
    flocon_orders_lib::start_server(config);
}
