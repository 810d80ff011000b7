//! `list-tickers` and `info`.

use std::path::Path;

use anyhow::{Context, Result, bail};
use ohlcv::{ReferenceClient, Symbol, YahooClient, available_countries, country_tickers};
use tracing::warn;

use crate::util::format_thousands;

pub(crate) fn list_tickers(dir: &Path, country: Option<&str>) -> Result<()> {
    if let Some(country) = country {
        let tickers = country_tickers(dir, country)
            .with_context(|| format!("No tickers found for country {country}"))?;
        if tickers.is_empty() {
            bail!("No tickers found for country {country}");
        }
        println!("Tickers for {}:", country.to_uppercase());
        for ticker in &tickers {
            println!("  {ticker}");
        }
        println!("Total: {} tickers", tickers.len());
        return Ok(());
    }

    let countries = available_countries(dir)?;
    if countries.is_empty() {
        println!("No ticker lists found in {}", dir.display());
        return Ok(());
    }

    println!("Available countries:");
    for country in &countries {
        match country_tickers(dir, country) {
            Ok(tickers) => println!("  {}: {} tickers", country.to_uppercase(), tickers.len()),
            Err(e) => warn!(country = %country, error = %e, "Could not read ticker list"),
        }
    }
    Ok(())
}

pub(crate) async fn info(ticker: &str) -> Result<()> {
    let symbol = Symbol::new(ticker);
    let client = YahooClient::new();
    let info = client
        .company_info(&symbol)
        .await
        .with_context(|| format!("No information found for ticker {symbol}"))?;

    println!("Company Information for {symbol}:");
    println!("Name: {}", or_na(&info.name));
    println!("Sector: {}", or_na(&info.sector));
    println!("Industry: {}", or_na(&info.industry));
    println!(
        "Market Cap: {}",
        info.market_cap
            .map_or_else(|| "N/A".to_string(), format_thousands)
    );
    println!("Currency: {}", or_na(&info.currency));
    println!("Exchange: {}", or_na(&info.exchange));
    println!("Country: {}", or_na(&info.country));
    Ok(())
}

fn or_na(value: &str) -> &str {
    if value.is_empty() { "N/A" } else { value }
}
