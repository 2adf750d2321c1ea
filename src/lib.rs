//! Binh Minh Bakery POS - Tauri v2 Backend
//!
//! This crate is the event-handling layer behind the React POS frontend:
//! IPC commands for the sales screen (cart, pricing, settlement), the
//! customer debt ledger, cake pre-orders, the product catalog with stock
//! intake, the staff roster, and back-office reports. All persistence lives
//! in the hosted backend; the terminal keeps only transient, re-fetchable
//! state.

use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod auth;
mod cake_orders;
mod cart;
mod catalog;
mod checkout;
mod commands;
mod debt;
mod error;
mod invoice;
mod models;
mod reports;
mod shifts;
mod storage;
mod store;
mod uploads;

/// Per-user log directory (`.../binh-minh-pos/logs`).
fn log_dir() -> PathBuf {
    let base = std::env::var("LOCALAPPDATA")
        .or_else(|_| std::env::var("XDG_DATA_HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            #[cfg(target_os = "windows")]
            {
                PathBuf::from(std::env::var("USERPROFILE").unwrap_or_else(|_| ".".into()))
                    .join("AppData")
                    .join("Local")
            }
            #[cfg(not(target_os = "windows"))]
            {
                PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()))
                    .join(".local")
                    .join("share")
            }
        });
    base.join("binh-minh-pos").join("logs")
}

// ============================================================================
// App entry point
// ============================================================================

pub fn run() {
    // Initialize structured logging (console + rolling file)
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,binh_minh_pos_lib=debug"));

    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, "pos");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    // Keep the guard alive for the lifetime of the app; dropping it flushes
    // logs. We leak it intentionally since the app runs until process exit.
    std::mem::forget(_guard);

    info!(
        "Starting Binh Minh POS v{} (build {})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_GIT_SHA")
    );

    tauri::Builder::default()
        .setup(|app| {
            use tauri::Manager;

            app.manage(api::SupabaseClient::new());
            app.manage(auth::AuthState::new());
            app.manage(cart::PosState::new());

            info!("Backend client, auth, and POS state registered");
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Auth
            commands::auth::auth_login,
            commands::auth::auth_restore_session,
            commands::auth::auth_logout,
            commands::auth::auth_get_session,
            commands::auth::auth_get_profile,
            // Settings
            commands::settings::settings_is_configured,
            commands::settings::settings_update_backend_credentials,
            commands::settings::settings_factory_reset,
            commands::settings::settings_get_store_info,
            // POS
            commands::pos::pos_get_state,
            commands::pos::cart_add_item,
            commands::pos::cart_set_quantity,
            commands::pos::cart_set_price_mode,
            commands::pos::cart_set_discount,
            commands::pos::cart_select_customer,
            commands::pos::cart_clear,
            commands::pos::pos_settle,
            // Products / inventory
            commands::products::product_get_all,
            commands::products::product_save,
            commands::products::inventory_import,
            commands::products::inventory_get_logs,
            commands::products::image_upload,
            // Customers / debt ledger
            commands::customers::customer_get_all,
            commands::customers::customer_search,
            commands::customers::customer_save,
            commands::customers::debt_record_transaction,
            commands::customers::debt_get_transactions,
            // Cake pre-orders
            commands::cake_orders::cake_order_create,
            commands::cake_orders::cake_order_get_schedule,
            commands::cake_orders::cake_order_mark_delivered,
            commands::cake_orders::cake_order_get_history,
            // Shifts
            commands::shifts::shift_get_all,
            commands::shifts::shift_save,
            commands::shifts::shift_delete,
            commands::shifts::shift_get_summary,
            // Reports
            commands::reports::report_get_revenue,
            commands::reports::report_get_debt,
            commands::reports::report_get_inventory,
        ])
        .run(tauri::generate_context!())
        .expect("error while running Binh Minh POS");
}
