use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use rhai::{EvalAltResult, ImmutableString, Module, FLOAT, INT};

fn time_error(message: impl std::fmt::Display) -> Box<EvalAltResult> {
    format!("time: {}", message).into()
}

fn now_seconds() -> FLOAT {
    let now = Utc::now();
    now.timestamp() as FLOAT + FLOAT::from(now.timestamp_subsec_nanos()) / 1e9
}

fn to_datetime(seconds: FLOAT) -> Result<DateTime<Utc>, Box<EvalAltResult>> {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    Utc.timestamp_opt(whole as i64, nanos.min(999_999_999))
        .single()
        .ok_or_else(|| time_error(format!("timestamp out of range: {}", seconds)))
}

fn from_datetime(value: DateTime<Utc>) -> FLOAT {
    value.timestamp() as FLOAT + FLOAT::from(value.timestamp_subsec_nanos()) / 1e9
}

fn format_time(seconds: FLOAT, pattern: Option<&str>) -> Result<String, Box<EvalAltResult>> {
    let value = to_datetime(seconds)?;
    Ok(match pattern {
        Some(pattern) => value.format(pattern).to_string(),
        None => value.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    })
}

fn parse_time(text: &str, pattern: Option<&str>) -> Result<FLOAT, Box<EvalAltResult>> {
    match pattern {
        Some(pattern) => NaiveDateTime::parse_from_str(text, pattern)
            .map(|value| from_datetime(value.and_utc()))
            .map_err(time_error),
        None => DateTime::parse_from_rfc3339(text)
            .map(|value| from_datetime(value.with_timezone(&Utc)))
            .map_err(time_error),
    }
}

pub(crate) fn module() -> Module {
    let mut module = Module::new();
    module.set_var("second", 1.0 as FLOAT);
    module.set_var("minute", 60.0 as FLOAT);
    module.set_var("hour", 3_600.0 as FLOAT);
    module.set_var("day", 86_400.0 as FLOAT);

    module.set_native_fn("now", || Ok(now_seconds()));
    module.set_native_fn("unix", || Ok(Utc::now().timestamp() as INT));
    module.set_native_fn("unix_ms", || Ok(Utc::now().timestamp_millis() as INT));
    module.set_native_fn("since", |start: FLOAT| Ok(now_seconds() - start));
    module.set_native_fn("since", |start: INT| Ok(now_seconds() - start as FLOAT));
    module.set_native_fn("format", |seconds: FLOAT| format_time(seconds, None));
    module.set_native_fn("format", |seconds: INT| format_time(seconds as FLOAT, None));
    module.set_native_fn("format", |seconds: FLOAT, pattern: ImmutableString| {
        format_time(seconds, Some(pattern.as_str()))
    });
    module.set_native_fn("format", |seconds: INT, pattern: ImmutableString| {
        format_time(seconds as FLOAT, Some(pattern.as_str()))
    });
    module.set_native_fn("parse", |text: ImmutableString| parse_time(&text, None));
    module.set_native_fn("parse", |text: ImmutableString, pattern: ImmutableString| {
        parse_time(&text, Some(pattern.as_str()))
    });
    module.build_index();
    module
}
