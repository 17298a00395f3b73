use std::collections::BTreeMap;

use rhai::{Array, Blob, Dynamic, ImmutableString, Map, FLOAT, INT};
use sb_core::SbValue;

pub fn rhai_function_symbol(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    out
}

pub(crate) fn struct_function_symbol(struct_name: &str, function_name: &str) -> String {
    format!(
        "__sb_struct_{}__{}",
        rhai_function_symbol(struct_name),
        rhai_function_symbol(function_name)
    )
}

/// Converts a host value, naming record fields after `struct_tag`.
pub fn sbvalue_to_dynamic(value: &SbValue, struct_tag: &str) -> Dynamic {
    match value {
        SbValue::Unit | SbValue::Opaque(_) => Dynamic::UNIT,
        SbValue::Bool(value) => Dynamic::from_bool(*value),
        SbValue::Int(value) => Dynamic::from_int(*value as INT),
        SbValue::Float(value) => Dynamic::from_float(*value as FLOAT),
        SbValue::String(value) => Dynamic::from(value.clone()),
        SbValue::Array(values) => Dynamic::from_array(
            values
                .iter()
                .map(|value| sbvalue_to_dynamic(value, struct_tag))
                .collect::<Array>(),
        ),
        SbValue::Map(values) => Dynamic::from_map(map_to_rhai(values, struct_tag)),
        SbValue::Record(record) => {
            Dynamic::from_map(map_to_rhai(&record.to_map(struct_tag), struct_tag))
        }
    }
}

fn map_to_rhai(values: &BTreeMap<String, SbValue>, struct_tag: &str) -> Map {
    let mut map = Map::new();
    for (key, value) in values {
        map.insert(key.as_str().into(), sbvalue_to_dynamic(value, struct_tag));
    }
    map
}

pub fn dynamic_to_sbvalue(value: Dynamic) -> SbValue {
    if value.is_unit() {
        return SbValue::Unit;
    }
    if value.is::<bool>() {
        return SbValue::Bool(value.cast::<bool>());
    }
    if value.is::<INT>() {
        return SbValue::Int(value.cast::<INT>() as i64);
    }
    if value.is::<FLOAT>() {
        return SbValue::Float(value.cast::<FLOAT>() as f64);
    }
    if value.is::<ImmutableString>() {
        return SbValue::String(value.cast::<ImmutableString>().to_string());
    }
    if value.is::<char>() {
        return SbValue::String(value.cast::<char>().to_string());
    }
    if value.is::<Blob>() {
        return SbValue::Array(
            value
                .cast::<Blob>()
                .into_iter()
                .map(|byte| SbValue::Int(i64::from(byte)))
                .collect(),
        );
    }
    if value.is::<Array>() {
        return SbValue::Array(
            value
                .cast::<Array>()
                .into_iter()
                .map(dynamic_to_sbvalue)
                .collect(),
        );
    }
    if value.is::<Map>() {
        let mut out = BTreeMap::new();
        for (key, value) in value.cast::<Map>() {
            out.insert(key.to_string(), dynamic_to_sbvalue(value));
        }
        return SbValue::Map(out);
    }

    SbValue::Opaque(value.type_name().to_string())
}

pub fn json_to_dynamic(value: serde_json::Value) -> Dynamic {
    sbvalue_to_dynamic(&SbValue::from(value), sb_core::DEFAULT_STRUCT_TAG)
}

pub fn dynamic_to_json(value: Dynamic) -> serde_json::Value {
    dynamic_to_sbvalue(value).to_json(sb_core::DEFAULT_STRUCT_TAG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_core::Record;

    #[test]
    fn function_symbols_are_identifiers() {
        assert_eq!(rhai_function_symbol("a.b-c"), "a_b_c");
        assert_eq!(
            struct_function_symbol("calc", "double"),
            "__sb_struct_calc__double"
        );
    }

    #[test]
    fn host_values_convert_into_rhai_values() {
        let value = SbValue::Array(vec![
            SbValue::Int(1),
            SbValue::Float(2.5),
            SbValue::from("x"),
            SbValue::Unit,
        ]);
        let dynamic = sbvalue_to_dynamic(&value, "rhai");
        let array = dynamic.cast::<Array>();
        assert_eq!(array[0].as_int(), Ok(1));
        assert_eq!(array[1].as_float(), Ok(2.5));
        assert_eq!(array[2].clone().into_string().as_deref(), Ok("x"));
        assert!(array[3].is_unit());
    }

    #[test]
    fn records_follow_struct_tag() {
        let record = Record::new("Person")
            .tagged_field("Nick1", "Kai", &[("json", "nick")])
            .tagged_field("Nick2", "Kalani", &[("rhai", "nick")]);
        let value = SbValue::Record(record);

        let as_rhai = sbvalue_to_dynamic(&value, "rhai").cast::<Map>();
        assert_eq!(
            as_rhai.get("nick").map(|value| value.to_string()),
            Some("Kalani".to_string())
        );

        let as_json = sbvalue_to_dynamic(&value, "json").cast::<Map>();
        assert_eq!(
            as_json.get("nick").map(|value| value.to_string()),
            Some("Kai".to_string())
        );
    }

    #[test]
    fn rhai_values_convert_back() {
        let mut map = Map::new();
        map.insert("n".into(), Dynamic::from_int(4));
        map.insert("c".into(), Dynamic::from('z'));
        map.insert("b".into(), Dynamic::from_blob(vec![1, 2]));
        let value = dynamic_to_sbvalue(Dynamic::from_map(map));
        let SbValue::Map(map) = value else {
            panic!("map expected");
        };
        assert_eq!(map.get("n"), Some(&SbValue::Int(4)));
        assert_eq!(map.get("c"), Some(&SbValue::from("z")));
        assert_eq!(
            map.get("b"),
            Some(&SbValue::Array(vec![SbValue::Int(1), SbValue::Int(2)]))
        );
    }

    #[test]
    fn unknown_types_become_opaque() {
        let value = dynamic_to_sbvalue(Dynamic::from(std::time::Duration::from_secs(1)));
        assert!(matches!(value, SbValue::Opaque(_)));
    }

    #[test]
    fn json_round_trip_through_dynamic() {
        let json = serde_json::json!({"a": [1, 2.5, "s"], "b": null});
        assert_eq!(dynamic_to_json(json_to_dynamic(json.clone())), json);
    }
}
