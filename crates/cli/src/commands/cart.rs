//! Cart commands.

use std::time::Duration;

use storecart_client::SyncReport;
use storecart_core::{Cart, ProductId};
use tracing::info;

use super::{CommandError, Context, parse_line_id};

/// Print the cart.
#[allow(clippy::print_stdout)]
pub fn show(ctx: &Context) {
    let manager = ctx.session.manager();
    let cart = manager.cart();
    let mode = if ctx.session.auth().is_authenticated() {
        "signed in"
    } else {
        "offline"
    };

    if cart.is_empty() {
        println!("Cart is empty ({mode})");
        return;
    }

    println!("Cart ({mode}):");
    print_lines(&cart);
    println!(
        "{} item(s), total {}",
        manager.total_items(),
        manager.total_price()
    );
}

/// Look up a product and add it.
pub async fn add(ctx: &Context, product_id: i64, quantity: u32) -> Result<(), CommandError> {
    let product = ctx.client.get_product(ProductId::new(product_id)).await?;
    info!(product = %product.name, quantity, "Adding to cart");
    let cart = ctx.session.manager().add_line(product, quantity).await?;
    print_lines(&cart);
    Ok(())
}

/// Set a line's quantity.
pub async fn update(ctx: &Context, line_id: &str, quantity: u32) -> Result<(), CommandError> {
    let line_id = parse_line_id(line_id)?;
    let cart = ctx
        .session
        .manager()
        .update_quantity(line_id, quantity)
        .await?;
    print_lines(&cart);
    Ok(())
}

/// Remove a line.
pub async fn remove(ctx: &Context, line_id: &str) -> Result<(), CommandError> {
    let line_id = parse_line_id(line_id)?;
    let cart = ctx.session.manager().remove_line(line_id).await?;
    print_lines(&cart);
    Ok(())
}

/// Empty the cart.
pub async fn clear(ctx: &Context) -> Result<(), CommandError> {
    ctx.session.manager().clear_cart().await?;
    info!("Cart cleared");
    Ok(())
}

/// Check out and print where to pay.
#[allow(clippy::print_stdout)]
pub async fn checkout(ctx: &Context) -> Result<(), CommandError> {
    let receipt = ctx.session.manager().checkout().await?;
    println!(
        "Order {} created: {} ({})",
        receipt.order.id, receipt.order.total_amount, receipt.order.status
    );
    if let Some(url) = receipt.payment_url {
        println!("Pay at: {url}");
    }
    Ok(())
}

/// Retry the offline drain.
pub async fn sync(ctx: &Context) -> Result<(), CommandError> {
    let report = ctx.session.manager().sync_local_cache_to_remote().await?;
    print_report(&report);
    Ok(())
}

/// Wait at most this long for the drain triggered by signing in.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

#[allow(clippy::print_stdout)]
pub fn print_report(report: &SyncReport) {
    println!("Synced {} line(s)", report.synced);
    for failed in &report.failed {
        println!(
            "  not synced: product {} x{} ({})",
            failed.product_id, failed.quantity, failed.error
        );
    }
    if report.retained > 0 {
        println!("{} line(s) kept offline; run `storecart sync` to retry", report.retained);
    }
}

#[allow(clippy::print_stdout)]
fn print_lines(cart: &Cart) {
    for line in cart.lines() {
        println!(
            "  {:<38} {:<24} x{:<4} {}",
            line.id,
            line.product.name,
            line.quantity,
            line.line_total()
        );
    }
}
