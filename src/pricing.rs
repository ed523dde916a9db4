use crate::model::{PurchaseType, Quality, RentalDuration};
use serde::Serialize;

/// Prices in whole rupees, rows by quality and columns by duration.
const PRICING_MATRIX: [[u32; 4]; 4] = [
    [19, 39, 59, 199],
    [29, 59, 89, 249],
    [39, 79, 119, 299],
    [59, 119, 159, 399],
];

pub fn price(quality: Quality, duration: RentalDuration) -> u32 {
    let row = match quality {
        Quality::SD => 0,
        Quality::HD => 1,
        Quality::FHD => 2,
        Quality::UHD => 3,
    };
    let col = match duration {
        RentalDuration::Day => 0,
        RentalDuration::Week => 1,
        RentalDuration::Month => 2,
        RentalDuration::Lifetime => 3,
    };
    PRICING_MATRIX[row][col]
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PricingOption {
    pub quality: Quality,
    pub duration: RentalDuration,
    pub price: u32,
    #[serde(rename = "type")]
    pub kind: PurchaseType,
    pub label: String,
    pub formatted_price: String,
}

pub fn pricing_options() -> Vec<PricingOption> {
    Quality::ALL
        .iter()
        .flat_map(|&quality| {
            RentalDuration::ALL.iter().map(move |&duration| {
                let price = price(quality, duration);
                PricingOption {
                    quality,
                    duration,
                    price,
                    kind: duration.purchase_type(),
                    label: format!("{} · {}", quality, duration.label()),
                    formatted_price: format_currency(price),
                }
            })
        })
        .collect()
}

/// Formats a rupee amount with Indian digit grouping, e.g. `₹12,34,567`.
pub fn format_currency(amount: u32) -> String {
    let digits = amount.to_string();
    if digits.len() <= 3 {
        return format!("₹{}", digits);
    }
    let (head, last3) = digits.split_at(digits.len() - 3);
    let mut groups = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (h, t) = rest.split_at(rest.len() - 2);
        groups.push(t);
        rest = h;
    }
    groups.push(rest);
    groups.reverse();
    format!("₹{},{}", groups.join(","), last3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table() {
        assert_eq!(price(Quality::SD, RentalDuration::Day), 19);
        assert_eq!(price(Quality::HD, RentalDuration::Week), 59);
        assert_eq!(price(Quality::FHD, RentalDuration::Month), 119);
        assert_eq!(price(Quality::UHD, RentalDuration::Lifetime), 399);
    }

    #[test]
    fn options_cover_every_combination() {
        let options = pricing_options();
        assert_eq!(options.len(), 16);
        for option in &options {
            assert_eq!(option.price, price(option.quality, option.duration));
            assert_eq!(
                option.kind == PurchaseType::Buy,
                option.duration == RentalDuration::Lifetime
            );
        }
    }

    #[test]
    fn currency() {
        assert_eq!(format_currency(59), "₹59");
        assert_eq!(format_currency(1234), "₹1,234");
        assert_eq!(format_currency(1234567), "₹12,34,567");
    }
}
