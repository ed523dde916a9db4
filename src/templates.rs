use crate::model::{Quality, RentalDuration};
use crate::player::format_time;
use crate::pricing::format_currency;
use std::collections::HashMap;
use tera::{Tera, Value};

fn currency(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    match value.as_u64() {
        Some(amount) if amount <= u64::from(u32::MAX) => {
            Ok(Value::String(format_currency(amount as u32)))
        }
        _ => Err(tera::Error::msg(format!("currency: not an amount: {}", value))),
    }
}

fn duration_label(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let label = value
        .as_str()
        .and_then(RentalDuration::parse)
        .map(RentalDuration::label)
        .ok_or_else(|| tera::Error::msg(format!("duration_label: unknown duration {}", value)))?;
    Ok(Value::String(label.to_owned()))
}

fn quality_description(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let description = value
        .as_str()
        .and_then(Quality::parse)
        .map(Quality::description)
        .ok_or_else(|| tera::Error::msg(format!("quality_description: unknown quality {}", value)))?;
    Ok(Value::String(description.to_owned()))
}

fn clock(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let seconds = value
        .as_f64()
        .ok_or_else(|| tera::Error::msg(format!("clock: not a number: {}", value)))?;
    Ok(Value::String(format_time(seconds)))
}

fn register_filters(tera: &mut Tera) {
    tera.register_filter("currency", currency);
    tera.register_filter("duration_label", duration_label);
    tera.register_filter("quality_description", quality_description);
    tera.register_filter("clock", clock);
}

pub fn load() -> tera::Result<Tera> {
    let mut tera = Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*"))?;
    register_filters(&mut tera);
    Ok(tera)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tera::Context;

    fn render(template: &str, ctx: &Context) -> tera::Result<String> {
        let mut tera = Tera::default();
        register_filters(&mut tera);
        tera.render_str(template, ctx)
    }

    #[test]
    fn filters() {
        let mut ctx = Context::new();
        ctx.insert("price", &1299u32);
        ctx.insert("duration", &RentalDuration::Week);
        ctx.insert("quality", &Quality::UHD);
        ctx.insert("t", &3725.0f64);
        let out = render(
            "{{ price | currency }}|{{ duration | duration_label }}|{{ quality | quality_description }}|{{ t | clock }}",
            &ctx,
        )
        .unwrap();
        assert_eq!(out, "₹1,299|7 Days|4K Ultra HD (2160p)|1:02:05");
    }

    #[test]
    fn bad_input_is_an_error() {
        let mut ctx = Context::new();
        ctx.insert("duration", "forever");
        assert!(render("{{ duration | duration_label }}", &ctx).is_err());
    }

    #[test]
    fn all_templates_parse() {
        load().unwrap();
    }
}
