use rhai::{Array, Blob, Dynamic, EvalAltResult, ImmutableString, Module, FLOAT, INT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    Little,
    Big,
}

impl Order {
    fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Bool,
    Pad,
}

impl Field {
    fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'b' => Self::I8,
            'B' => Self::U8,
            'h' => Self::I16,
            'H' => Self::U16,
            'i' | 'l' => Self::I32,
            'I' | 'L' => Self::U32,
            'q' => Self::I64,
            'Q' => Self::U64,
            'f' => Self::F32,
            'd' => Self::F64,
            '?' => Self::Bool,
            'x' => Self::Pad,
            _ => return None,
        })
    }

    fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 | Self::Bool | Self::Pad => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }
}

struct Layout {
    order: Order,
    fields: Vec<Field>,
}

impl Layout {
    fn size(&self) -> usize {
        self.fields.iter().map(|field| field.size()).sum()
    }

    fn value_count(&self) -> usize {
        self.fields
            .iter()
            .filter(|field| **field != Field::Pad)
            .count()
    }
}

/// Largest packed size a format may describe.
const MAX_LAYOUT_SIZE: usize = 1 << 20;

fn binary_error(message: impl std::fmt::Display) -> Box<EvalAltResult> {
    format!("binary: {}", message).into()
}

fn parse_layout(format: &str) -> Result<Layout, Box<EvalAltResult>> {
    let mut chars = format.chars().filter(|ch| !ch.is_whitespace()).peekable();
    let order = match chars.peek() {
        Some('<') => Order::Little,
        Some('>') | Some('!') => Order::Big,
        _ => Order::native(),
    };
    if matches!(chars.peek(), Some('<' | '>' | '!' | '=' | '@')) {
        chars.next();
    }

    let mut fields = Vec::new();
    let mut size = 0_usize;
    let mut count: Option<usize> = None;
    for ch in chars {
        if let Some(digit) = ch.to_digit(10) {
            let next = count
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|value| value.checked_add(digit as usize))
                .filter(|value| *value <= MAX_LAYOUT_SIZE)
                .ok_or_else(|| binary_error("repeat count too large"))?;
            count = Some(next);
            continue;
        }
        let field =
            Field::from_code(ch).ok_or_else(|| binary_error(format!("bad format code {:?}", ch)))?;
        let repeat = count.take().unwrap_or(1);
        size = repeat
            .checked_mul(field.size())
            .and_then(|bytes| size.checked_add(bytes))
            .filter(|total| *total <= MAX_LAYOUT_SIZE)
            .ok_or_else(|| {
                binary_error(format!("format exceeds {} bytes", MAX_LAYOUT_SIZE))
            })?;
        fields.extend(std::iter::repeat(field).take(repeat));
    }
    if count.is_some() {
        return Err(binary_error("repeat count without a format code"));
    }
    Ok(Layout { order, fields })
}

macro_rules! put {
    ($out:expr, $order:expr, $value:expr) => {
        match $order {
            Order::Little => $out.extend_from_slice(&$value.to_le_bytes()),
            Order::Big => $out.extend_from_slice(&$value.to_be_bytes()),
        }
    };
}

macro_rules! take {
    ($ty:ty, $bytes:expr, $order:expr) => {{
        let mut raw = [0u8; std::mem::size_of::<$ty>()];
        raw.copy_from_slice($bytes);
        match $order {
            Order::Little => <$ty>::from_le_bytes(raw),
            Order::Big => <$ty>::from_be_bytes(raw),
        }
    }};
}

fn int_value(value: &Dynamic) -> Result<INT, Box<EvalAltResult>> {
    if let Ok(flag) = value.as_bool() {
        return Ok(INT::from(flag));
    }
    value
        .as_int()
        .map_err(|actual| binary_error(format!("expected int, got {}", actual)))
}

fn float_value(value: &Dynamic) -> Result<FLOAT, Box<EvalAltResult>> {
    if let Ok(value) = value.as_float() {
        return Ok(value);
    }
    value
        .as_int()
        .map(|value| value as FLOAT)
        .map_err(|actual| binary_error(format!("expected number, got {}", actual)))
}

fn pack(format: &str, values: &Array) -> Result<Blob, Box<EvalAltResult>> {
    let layout = parse_layout(format)?;
    if layout.value_count() != values.len() {
        return Err(binary_error(format!(
            "format needs {} values, got {}",
            layout.value_count(),
            values.len()
        )));
    }
    let mut out = Blob::with_capacity(layout.size());
    let mut values = values.iter();
    for field in &layout.fields {
        if *field == Field::Pad {
            out.push(0);
            continue;
        }
        let Some(value) = values.next() else {
            break;
        };
        match field {
            Field::I8 => put!(out, layout.order, int_value(value)? as i8),
            Field::U8 => put!(out, layout.order, int_value(value)? as u8),
            Field::I16 => put!(out, layout.order, int_value(value)? as i16),
            Field::U16 => put!(out, layout.order, int_value(value)? as u16),
            Field::I32 => put!(out, layout.order, int_value(value)? as i32),
            Field::U32 => put!(out, layout.order, int_value(value)? as u32),
            Field::I64 => put!(out, layout.order, int_value(value)? as i64),
            Field::U64 => put!(out, layout.order, int_value(value)? as u64),
            Field::F32 => put!(out, layout.order, float_value(value)? as f32),
            Field::F64 => put!(out, layout.order, float_value(value)? as f64),
            Field::Bool => out.push(u8::from(int_value(value)? != 0)),
            Field::Pad => {}
        }
    }
    Ok(out)
}

fn unpack(format: &str, bytes: &Blob) -> Result<Array, Box<EvalAltResult>> {
    let layout = parse_layout(format)?;
    if layout.size() != bytes.len() {
        return Err(binary_error(format!(
            "format needs {} bytes, got {}",
            layout.size(),
            bytes.len()
        )));
    }
    let mut out = Array::with_capacity(layout.value_count());
    let mut offset = 0;
    for field in &layout.fields {
        let chunk = &bytes[offset..offset + field.size()];
        offset += field.size();
        let value = match field {
            Field::Pad => continue,
            Field::I8 => Dynamic::from_int(take!(i8, chunk, layout.order) as INT),
            Field::U8 => Dynamic::from_int(take!(u8, chunk, layout.order) as INT),
            Field::I16 => Dynamic::from_int(take!(i16, chunk, layout.order) as INT),
            Field::U16 => Dynamic::from_int(take!(u16, chunk, layout.order) as INT),
            Field::I32 => Dynamic::from_int(take!(i32, chunk, layout.order) as INT),
            Field::U32 => Dynamic::from_int(take!(u32, chunk, layout.order) as INT),
            Field::I64 => Dynamic::from_int(take!(i64, chunk, layout.order) as INT),
            Field::U64 => Dynamic::from_int(take!(u64, chunk, layout.order) as INT),
            Field::F32 => Dynamic::from_float(take!(f32, chunk, layout.order) as FLOAT),
            Field::F64 => Dynamic::from_float(take!(f64, chunk, layout.order) as FLOAT),
            Field::Bool => Dynamic::from_bool(chunk[0] != 0),
        };
        out.push(value);
    }
    Ok(out)
}

pub(crate) fn module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("pack", |format: ImmutableString, values: Array| {
        pack(&format, &values)
    });
    module.set_native_fn("unpack", |format: ImmutableString, bytes: Blob| {
        unpack(&format, &bytes)
    });
    module.set_native_fn("calcsize", |format: ImmutableString| {
        Ok(parse_layout(&format)?.size() as INT)
    });
    module.build_index();
    module
}
