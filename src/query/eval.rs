//! # Filter Evaluation
//!
//! Every expression is a generator: one input yields zero or more outputs.
//! Outputs are pushed onto `out` as they are produced, so `?` can keep the
//! values emitted before an error.

use std::cmp::Ordering;

use regex::RegexBuilder;
use serde_json::{Map, Number, Value};

use super::ast::{BinOp, Expr, ObjectKey};
use super::errors::{QueryError, QueryResult};

/// Largest string `string * number` may produce
pub const MAX_REPEAT_BYTES: usize = 4 * 1024 * 1024;

// ==================
// Values
// ==================

/// Build a JSON number, using an integer representation when exact
pub fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn as_f64(n: &Number) -> f64 {
    n.as_f64().unwrap_or_default()
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// `null` and `false` are falsy, everything else is truthy
pub fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// Total order: null < false < true < numbers < strings < arrays < objects.
/// Objects compare by their sorted key sets first, then value by value.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => as_f64(x)
            .partial_cmp(&as_f64(y))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let ord = compare(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            let mut kx: Vec<&String> = x.keys().collect();
            let mut ky: Vec<&String> = y.keys().collect();
            kx.sort();
            ky.sort();
            let keys = kx.cmp(&ky);
            if keys != Ordering::Equal {
                return keys;
            }
            for k in kx {
                let ord = compare(&x[k], &y[k]);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        }
        _ => Ordering::Equal,
    }
}

/// Short rendering of a value for error messages
fn brief(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 11 {
        let head: String = text.chars().take(10).collect();
        format!("{}...", head)
    } else {
        text
    }
}

fn err<T>(message: impl Into<String>) -> QueryResult<T> {
    Err(QueryError::runtime(message))
}

// ==================
// Evaluation
// ==================

/// Evaluate `expr` against `input`, collecting every output
pub fn run(expr: &Expr, input: &Value) -> QueryResult<Vec<Value>> {
    let mut out = Vec::new();
    eval(expr, input, &mut out)?;
    Ok(out)
}

fn eval(expr: &Expr, input: &Value, out: &mut Vec<Value>) -> QueryResult<()> {
    match expr {
        Expr::Identity => out.push(input.clone()),
        Expr::Literal(v) => out.push(v.clone()),

        Expr::Index { target, index } => {
            let indices = run(index, input)?;
            for t in run(target, input)? {
                for i in &indices {
                    out.push(index_value(&t, i)?);
                }
            }
        }

        Expr::Slice { target, from, to } => {
            let froms = match from {
                Some(f) => run(f, input)?,
                None => vec![Value::Null],
            };
            let tos = match to {
                Some(t) => run(t, input)?,
                None => vec![Value::Null],
            };
            for t in run(target, input)? {
                for f in &froms {
                    for e in &tos {
                        out.push(slice_value(&t, f, e)?);
                    }
                }
            }
        }

        Expr::Iterate(target) => {
            for t in run(target, input)? {
                match t {
                    Value::Array(items) => out.extend(items),
                    Value::Object(map) => out.extend(map.into_iter().map(|(_, v)| v)),
                    other => return err(format!("Cannot iterate over {}", describe(&other))),
                }
            }
        }

        Expr::Optional(inner) => {
            // Errors end the stream but keep what was already produced
            let _ = eval(inner, input, out);
        }

        Expr::Pipe(lhs, rhs) => {
            for v in run(lhs, input)? {
                eval(rhs, &v, out)?;
            }
        }

        Expr::Comma(lhs, rhs) => {
            eval(lhs, input, out)?;
            eval(rhs, input, out)?;
        }

        Expr::Alternative(lhs, rhs) => {
            let mut produced = Vec::new();
            let _ = eval(lhs, input, &mut produced);
            let kept: Vec<Value> = produced.into_iter().filter(truthy).collect();
            if kept.is_empty() {
                eval(rhs, input, out)?;
            } else {
                out.extend(kept);
            }
        }

        Expr::And(lhs, rhs) => {
            for l in run(lhs, input)? {
                if !truthy(&l) {
                    out.push(Value::Bool(false));
                    continue;
                }
                for r in run(rhs, input)? {
                    out.push(Value::Bool(truthy(&r)));
                }
            }
        }

        Expr::Or(lhs, rhs) => {
            for l in run(lhs, input)? {
                if truthy(&l) {
                    out.push(Value::Bool(true));
                    continue;
                }
                for r in run(rhs, input)? {
                    out.push(Value::Bool(truthy(&r)));
                }
            }
        }

        Expr::Binary { op, lhs, rhs } => {
            let rights = run(rhs, input)?;
            let lefts = run(lhs, input)?;
            for r in &rights {
                for l in &lefts {
                    out.push(binary(*op, l, r)?);
                }
            }
        }

        Expr::Neg(inner) => {
            for v in run(inner, input)? {
                match v {
                    Value::Number(n) => out.push(number(-as_f64(&n))),
                    other => return err(format!("{} cannot be negated", describe(&other))),
                }
            }
        }

        Expr::Array(inner) => {
            let items = match inner {
                Some(e) => run(e, input)?,
                None => Vec::new(),
            };
            out.push(Value::Array(items));
        }

        Expr::Object(entries) => {
            for obj in build_objects(entries, input)? {
                out.push(Value::Object(obj));
            }
        }

        Expr::If {
            branches,
            otherwise,
        } => eval_if(branches, otherwise.as_deref(), input, out)?,

        Expr::Call { name, args } => call(name, args, input, out)?,
    }
    Ok(())
}

fn eval_if(
    branches: &[(Expr, Expr)],
    otherwise: Option<&Expr>,
    input: &Value,
    out: &mut Vec<Value>,
) -> QueryResult<()> {
    let Some(((cond, body), rest)) = branches.split_first() else {
        match otherwise {
            Some(e) => eval(e, input, out)?,
            None => out.push(input.clone()),
        }
        return Ok(());
    };
    for c in run(cond, input)? {
        if truthy(&c) {
            eval(body, input, out)?;
        } else {
            eval_if(rest, otherwise, input, out)?;
        }
    }
    Ok(())
}

/// Every combination of key and value outputs yields one object
fn build_objects(
    entries: &[(ObjectKey, Option<Expr>)],
    input: &Value,
) -> QueryResult<Vec<Map<String, Value>>> {
    let mut objects = vec![Map::new()];
    for (key, value) in entries {
        let keys: Vec<String> = match key {
            ObjectKey::Name(name) => vec![name.clone()],
            ObjectKey::Computed(e) => run(e, input)?
                .into_iter()
                .map(|k| match k {
                    Value::String(s) => Ok(s),
                    other => err(format!("Object keys must be strings, not {}", type_name(&other))),
                })
                .collect::<QueryResult<_>>()?,
        };
        let values = match value {
            Some(e) => run(e, input)?,
            None => {
                let name = keys.first().cloned().unwrap_or_default();
                vec![index_value(input, &Value::String(name))?]
            }
        };

        let mut next = Vec::with_capacity(objects.len() * keys.len() * values.len());
        for obj in &objects {
            for k in &keys {
                for v in &values {
                    let mut extended = obj.clone();
                    extended.insert(k.clone(), v.clone());
                    next.push(extended);
                }
            }
        }
        objects = next;
    }
    Ok(objects)
}

fn describe(value: &Value) -> String {
    format!("{} ({})", type_name(value), brief(value))
}

fn index_value(target: &Value, index: &Value) -> QueryResult<Value> {
    match (target, index) {
        (Value::Null, Value::String(_) | Value::Number(_) | Value::Null) => Ok(Value::Null),
        (Value::Object(map), Value::String(key)) => {
            Ok(map.get(key).cloned().unwrap_or(Value::Null))
        }
        (Value::Array(items), Value::Number(n)) => {
            let i = as_f64(n).floor() as i64;
            let i = if i < 0 { i + items.len() as i64 } else { i };
            if i < 0 {
                return Ok(Value::Null);
            }
            Ok(items.get(i as usize).cloned().unwrap_or(Value::Null))
        }
        (Value::Object(_), other) => err(format!("Cannot index object with {}", type_name(other))),
        (Value::Array(_), Value::String(key)) => {
            err(format!("Cannot index array with \"{}\"", key))
        }
        (target, Value::String(key)) => {
            err(format!("Cannot index {} with \"{}\"", type_name(target), key))
        }
        (target, index) => err(format!(
            "Cannot index {} with {}",
            type_name(target),
            type_name(index)
        )),
    }
}

fn slice_bounds(len: usize, from: &Value, to: &Value) -> QueryResult<(usize, usize)> {
    let resolve = |v: &Value, default: i64| -> QueryResult<usize> {
        let i = match v {
            Value::Null => default,
            Value::Number(n) => as_f64(n).floor() as i64,
            other => return err(format!("Start and end indices of a slice must be numbers, not {}", type_name(other))),
        };
        let i = if i < 0 { i + len as i64 } else { i };
        Ok(i.clamp(0, len as i64) as usize)
    };
    let start = resolve(from, 0)?;
    let end = resolve(to, len as i64)?;
    Ok((start, end.max(start)))
}

fn slice_value(target: &Value, from: &Value, to: &Value) -> QueryResult<Value> {
    match target {
        Value::Null => Ok(Value::Null),
        Value::Array(items) => {
            let (start, end) = slice_bounds(items.len(), from, to)?;
            Ok(Value::Array(items[start..end].to_vec()))
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = slice_bounds(chars.len(), from, to)?;
            Ok(Value::String(chars[start..end].iter().collect()))
        }
        other => err(format!("Cannot index {} with object", type_name(other))),
    }
}

fn binary(op: BinOp, l: &Value, r: &Value) -> QueryResult<Value> {
    match op {
        BinOp::Eq => Ok(Value::Bool(compare(l, r) == Ordering::Equal)),
        BinOp::Ne => Ok(Value::Bool(compare(l, r) != Ordering::Equal)),
        BinOp::Lt => Ok(Value::Bool(compare(l, r) == Ordering::Less)),
        BinOp::Le => Ok(Value::Bool(compare(l, r) != Ordering::Greater)),
        BinOp::Gt => Ok(Value::Bool(compare(l, r) == Ordering::Greater)),
        BinOp::Ge => Ok(Value::Bool(compare(l, r) != Ordering::Less)),
        BinOp::Add => add(l, r),
        BinOp::Sub => match (l, r) {
            (Value::Number(a), Value::Number(b)) => Ok(number(as_f64(a) - as_f64(b))),
            (Value::Array(a), Value::Array(b)) => Ok(Value::Array(
                a.iter()
                    .filter(|x| !b.iter().any(|y| compare(x, y) == Ordering::Equal))
                    .cloned()
                    .collect(),
            )),
            _ => err(format!("{} and {} cannot be subtracted", describe(l), describe(r))),
        },
        BinOp::Mul => match (l, r) {
            (Value::Number(a), Value::Number(b)) => Ok(number(as_f64(a) * as_f64(b))),
            (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
                let times = as_f64(n);
                if times <= 0.0 {
                    Ok(Value::Null)
                } else if s.len() as f64 * times.ceil() > MAX_REPEAT_BYTES as f64 {
                    err(format!("Repeat string result too long: {} * {}", describe(l), describe(r)))
                } else {
                    Ok(Value::String(s.repeat(times.ceil() as usize)))
                }
            }
            (Value::Object(a), Value::Object(b)) => Ok(Value::Object(deep_merge(a, b))),
            _ => err(format!("{} and {} cannot be multiplied", describe(l), describe(r))),
        },
        BinOp::Div => match (l, r) {
            (Value::Number(a), Value::Number(b)) => {
                let divisor = as_f64(b);
                if divisor == 0.0 {
                    return err(format!("{} and {} cannot be divided because the divisor is zero", describe(l), describe(r)));
                }
                Ok(number(as_f64(a) / divisor))
            }
            (Value::String(s), Value::String(sep)) => Ok(Value::Array(split(s, sep))),
            _ => err(format!("{} and {} cannot be divided", describe(l), describe(r))),
        },
        BinOp::Mod => match (l, r) {
            (Value::Number(a), Value::Number(b)) => {
                let divisor = as_f64(b) as i64;
                if divisor == 0 {
                    return err(format!("{} and {} cannot be divided because the divisor is zero", describe(l), describe(r)));
                }
                match (as_f64(a) as i64).checked_rem(divisor) {
                    Some(rem) => Ok(number(rem as f64)),
                    None => err(format!("{} and {} cannot be divided", describe(l), describe(r))),
                }
            }
            _ => err(format!("{} and {} cannot be divided", describe(l), describe(r))),
        },
    }
}

fn add(l: &Value, r: &Value) -> QueryResult<Value> {
    match (l, r) {
        (Value::Null, other) | (other, Value::Null) => Ok(other.clone()),
        (Value::Number(a), Value::Number(b)) => Ok(number(as_f64(a) + as_f64(b))),
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
        (Value::Array(a), Value::Array(b)) => {
            Ok(Value::Array(a.iter().chain(b.iter()).cloned().collect()))
        }
        (Value::Object(a), Value::Object(b)) => {
            let mut merged = a.clone();
            merged.extend(b.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(Value::Object(merged))
        }
        _ => err(format!("{} and {} cannot be added", describe(l), describe(r))),
    }
}

fn deep_merge(a: &Map<String, Value>, b: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = a.clone();
    for (k, v) in b {
        let combined = match (merged.get(k), v) {
            (Some(Value::Object(x)), Value::Object(y)) => Value::Object(deep_merge(x, y)),
            _ => v.clone(),
        };
        merged.insert(k.clone(), combined);
    }
    merged
}

fn split(s: &str, sep: &str) -> Vec<Value> {
    if s.is_empty() {
        return Vec::new();
    }
    if sep.is_empty() {
        return s.chars().map(|c| Value::String(c.to_string())).collect();
    }
    s.split(sep).map(|p| Value::String(p.to_string())).collect()
}

// ==================
// Builtins
// ==================

/// Outputs of a single-argument builtin's argument, evaluated on `input`
fn arg_values(args: &[Expr], i: usize, input: &Value) -> QueryResult<Vec<Value>> {
    match args.get(i) {
        Some(e) => run(e, input),
        None => err("missing argument"),
    }
}

fn call(name: &str, args: &[Expr], input: &Value, out: &mut Vec<Value>) -> QueryResult<()> {
    match (name, args.len()) {
        ("empty", 0) => {}
        ("error", 0) => return err(error_message(input)),
        ("error", 1) => {
            if let Some(msg) = arg_values(args, 0, input)?.first() {
                return err(error_message(msg));
            }
        }
        ("not", 0) => out.push(Value::Bool(!truthy(input))),
        ("length", 0) => out.push(length(input)?),
        ("keys", 0) => out.push(keys(input)?),
        ("values", 0) => {
            if !input.is_null() {
                out.push(input.clone());
            }
        }
        ("has", 1) => {
            for key in arg_values(args, 0, input)? {
                out.push(Value::Bool(has(input, &key)?));
            }
        }
        ("type", 0) => out.push(Value::String(type_name(input).to_string())),
        ("tostring", 0) => out.push(match input {
            Value::String(_) => input.clone(),
            other => Value::String(other.to_string()),
        }),
        ("tonumber", 0) => out.push(tonumber(input)?),
        ("contains", 1) => {
            for needle in arg_values(args, 0, input)? {
                out.push(Value::Bool(contains(input, &needle)?));
            }
        }
        ("startswith", 1) | ("endswith", 1) => {
            for affix in arg_values(args, 0, input)? {
                let (Value::String(s), Value::String(a)) = (input, &affix) else {
                    return err(format!("{}() requires string inputs", name));
                };
                let hit = if name == "startswith" { s.starts_with(a.as_str()) } else { s.ends_with(a.as_str()) };
                out.push(Value::Bool(hit));
            }
        }
        ("ascii_downcase", 0) | ("ascii_upcase", 0) => match input {
            Value::String(s) => out.push(Value::String(if name == "ascii_downcase" {
                s.to_ascii_lowercase()
            } else {
                s.to_ascii_uppercase()
            })),
            other => return err(format!("{} cannot be case-converted", describe(other))),
        },
        ("test", 1) | ("test", 2) => {
            let flags = match args.get(1) {
                Some(e) => run(e, input)?,
                None => vec![Value::Null],
            };
            for re in arg_values(args, 0, input)? {
                for f in &flags {
                    out.push(Value::Bool(test(input, &re, f)?));
                }
            }
        }
        ("select", 1) => {
            for cond in arg_values(args, 0, input)? {
                if truthy(&cond) {
                    out.push(input.clone());
                }
            }
        }
        ("map", 1) => {
            let mut mapped = Vec::new();
            for item in iterate(input)? {
                eval(&args[0], &item, &mut mapped)?;
            }
            out.push(Value::Array(mapped));
        }
        ("add", 0) => {
            let mut acc = Value::Null;
            for item in iterate(input)? {
                acc = add(&acc, &item)?;
            }
            out.push(acc);
        }
        ("any", _) | ("all", _) => out.push(Value::Bool(quantify(name, args, input)?)),
        ("first", 0) => out.push(index_value(input, &Value::from(0))?),
        ("last", 0) => out.push(index_value(input, &Value::from(-1))?),
        ("first", 1) => {
            if let Some(v) = arg_values(args, 0, input)?.into_iter().next() {
                out.push(v);
            }
        }
        ("last", 1) => {
            if let Some(v) = arg_values(args, 0, input)?.into_iter().last() {
                out.push(v);
            }
        }
        ("reverse", 0) => out.push(match input {
            Value::Null => Value::Array(Vec::new()),
            Value::String(s) => Value::String(s.chars().rev().collect()),
            Value::Array(items) => Value::Array(items.iter().rev().cloned().collect()),
            other => return err(format!("Cannot reverse {}", describe(other))),
        }),
        ("sort", 0) => {
            let mut items = array_input(input, "sorted")?;
            items.sort_by(compare);
            out.push(Value::Array(items));
        }
        ("sort_by", 1) => {
            let items = array_input(input, "sorted")?;
            let mut keyed = items
                .into_iter()
                .map(|item| -> QueryResult<(Value, Value)> {
                    Ok((Value::Array(run(&args[0], &item)?), item))
                })
                .collect::<QueryResult<Vec<_>>>()?;
            keyed.sort_by(|a, b| compare(&a.0, &b.0));
            out.push(Value::Array(keyed.into_iter().map(|(_, v)| v).collect()));
        }
        ("min", 0) | ("max", 0) => {
            let items = array_input(input, "compared")?;
            let pick = if name == "min" {
                items.into_iter().min_by(compare)
            } else {
                items.into_iter().max_by(compare)
            };
            out.push(pick.unwrap_or(Value::Null));
        }
        ("to_entries", 0) => out.push(to_entries(input)?),
        ("from_entries", 0) => out.push(from_entries(input)?),
        ("with_entries", 1) => {
            let mut mapped = Vec::new();
            if let Value::Array(entries) = to_entries(input)? {
                for entry in entries {
                    eval(&args[0], &entry, &mut mapped)?;
                }
            }
            out.push(from_entries(&Value::Array(mapped))?);
        }
        ("join", 1) => {
            for sep in arg_values(args, 0, input)? {
                out.push(join(input, &sep)?);
            }
        }
        (name, arity) => return err(format!("{}/{} is not defined", name, arity)),
    }
    Ok(())
}

fn error_message(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => format!("{} (not a string)", other),
    }
}

fn iterate(input: &Value) -> QueryResult<Vec<Value>> {
    match input {
        Value::Array(items) => Ok(items.clone()),
        Value::Object(map) => Ok(map.values().cloned().collect()),
        other => err(format!("Cannot iterate over {}", describe(other))),
    }
}

fn array_input(input: &Value, verb: &str) -> QueryResult<Vec<Value>> {
    match input {
        Value::Array(items) => Ok(items.clone()),
        other => err(format!("{} cannot be {}, as it is not an array", describe(other), verb)),
    }
}

fn length(input: &Value) -> QueryResult<Value> {
    Ok(match input {
        Value::Null => Value::from(0),
        Value::Bool(_) => return err(format!("{} has no length", describe(input))),
        Value::Number(n) => number(as_f64(n).abs()),
        Value::String(s) => Value::from(s.chars().count()),
        Value::Array(items) => Value::from(items.len()),
        Value::Object(map) => Value::from(map.len()),
    })
}

fn keys(input: &Value) -> QueryResult<Value> {
    match input {
        Value::Object(map) => {
            let mut names: Vec<&String> = map.keys().collect();
            names.sort();
            Ok(Value::Array(names.into_iter().map(|k| Value::String(k.clone())).collect()))
        }
        Value::Array(items) => Ok(Value::Array((0..items.len()).map(Value::from).collect())),
        other => err(format!("{} has no keys", describe(other))),
    }
}

fn has(input: &Value, key: &Value) -> QueryResult<bool> {
    match (input, key) {
        (Value::Object(map), Value::String(k)) => Ok(map.contains_key(k)),
        (Value::Array(items), Value::Number(n)) => {
            let i = as_f64(n);
            Ok(i >= 0.0 && (i as usize) < items.len())
        }
        _ => err(format!(
            "Cannot check whether {} has a {} key",
            type_name(input),
            type_name(key)
        )),
    }
}

fn tonumber(input: &Value) -> QueryResult<Value> {
    match input {
        Value::Number(_) => Ok(input.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(number)
            .or_else(|_| err(format!("Cannot parse '{}' as JSON", s))),
        other => err(format!("{} cannot be parsed as a number", describe(other))),
    }
}

fn contains(haystack: &Value, needle: &Value) -> QueryResult<bool> {
    match (haystack, needle) {
        (Value::String(a), Value::String(b)) => Ok(a.contains(b.as_str())),
        (Value::Array(a), Value::Array(b)) => {
            for n in b {
                let mut found = false;
                for h in a.iter().filter(|h| type_name(h) == type_name(n)) {
                    if contains(h, n)? {
                        found = true;
                        break;
                    }
                }
                if !found {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Value::Object(a), Value::Object(b)) => {
            for (k, n) in b {
                match a.get(k) {
                    Some(h) if contains(h, n)? => {}
                    _ => return Ok(false),
                }
            }
            Ok(true)
        }
        (a, b) if type_name(a) == type_name(b) => Ok(compare(a, b) == Ordering::Equal),
        (a, b) => err(format!(
            "{} and {} cannot have their containment checked",
            describe(a),
            describe(b)
        )),
    }
}

fn test(input: &Value, re: &Value, flags: &Value) -> QueryResult<bool> {
    let Value::String(text) = input else {
        return err(format!("{} cannot be matched, as it is not a string", describe(input)));
    };
    let Value::String(pattern) = re else {
        return err(format!("{} cannot be used as a regex", describe(re)));
    };
    let flags = match flags {
        Value::Null => "",
        Value::String(f) => f.as_str(),
        other => return err(format!("{} is not a string", describe(other))),
    };

    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'x' => builder.ignore_whitespace(true),
            's' => builder.dot_matches_new_line(true),
            'g' | 'n' => &mut builder,
            other => return err(format!("{} is not a valid modifier string", other)),
        };
    }
    let regex = builder
        .build()
        .map_err(|e| QueryError::runtime(format!("{} (at offset 0) is not a valid regex: {}", pattern, e)))?;
    Ok(regex.is_match(text))
}

/// `any`/`all` with zero, one (condition) or two (generator; condition) args
fn quantify(name: &str, args: &[Expr], input: &Value) -> QueryResult<bool> {
    let want_any = name == "any";
    let results: Vec<Value> = match args {
        [] => iterate(input)?,
        [cond] => {
            let mut produced = Vec::new();
            for item in iterate(input)? {
                eval(cond, &item, &mut produced)?;
            }
            produced
        }
        [generator, cond] => {
            let mut produced = Vec::new();
            for item in run(generator, input)? {
                eval(cond, &item, &mut produced)?;
            }
            produced
        }
        _ => return err(format!("{}/{} is not defined", name, args.len())),
    };
    Ok(if want_any {
        results.iter().any(truthy)
    } else {
        results.iter().all(truthy)
    })
}

fn to_entries(input: &Value) -> QueryResult<Value> {
    match input {
        Value::Object(map) => Ok(Value::Array(
            map.iter()
                .map(|(k, v)| {
                    let mut entry = Map::new();
                    entry.insert("key".into(), Value::String(k.clone()));
                    entry.insert("value".into(), v.clone());
                    Value::Object(entry)
                })
                .collect(),
        )),
        other => err(format!("{} has no keys", describe(other))),
    }
}

fn from_entries(input: &Value) -> QueryResult<Value> {
    let entries = array_input(input, "converted to an object")?;
    let mut map = Map::new();
    for entry in entries {
        let key = ["key", "k", "name", "Name", "Key", "K"]
            .iter()
            .find_map(|name| entry.get(name).filter(|v| truthy(v)));
        let key = match key {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => number(as_f64(n)).to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => return err(format!("Cannot use {} as object key", describe(&entry))),
        };
        let value = ["value", "v", "Value", "V"]
            .iter()
            .find_map(|name| entry.get(name))
            .cloned()
            .unwrap_or(Value::Null);
        map.insert(key, value);
    }
    Ok(Value::Object(map))
}

fn join(input: &Value, sep: &Value) -> QueryResult<Value> {
    let items = array_input(input, "joined")?;
    let Value::String(sep) = sep else {
        return err(format!("{} is not a valid separator", describe(sep)));
    };
    let mut parts = Vec::with_capacity(items.len());
    for item in &items {
        parts.push(match item {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Number(_) | Value::Bool(_) => item.to_string(),
            other => return err(format!("Cannot join with {}", describe(other))),
        });
    }
    Ok(Value::String(parts.join(sep)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;
    use serde_json::json;

    fn eval_str(filter: &str, input: Value) -> Vec<Value> {
        run(&parse(filter).unwrap(), &input).unwrap()
    }

    #[test]
    fn test_paths() {
        let doc = json!({"a": {"b": [1, 2, 3]}, "k-1": "x"});
        assert_eq!(eval_str(".a.b[0]", doc.clone()), vec![json!(1)]);
        assert_eq!(eval_str(".a.b[-1]", doc.clone()), vec![json!(3)]);
        assert_eq!(eval_str(r#"."k-1""#, doc.clone()), vec![json!("x")]);
        assert_eq!(eval_str(r#".["a"].b[1:]"#, doc.clone()), vec![json!([2, 3])]);
        assert_eq!(eval_str(".a.b[]", doc.clone()), vec![json!(1), json!(2), json!(3)]);
        assert_eq!(eval_str(".missing.deeper", doc), vec![Value::Null]);
    }

    #[test]
    fn test_optional_suppresses_errors() {
        assert_eq!(eval_str(".[]?", json!(5)), Vec::<Value>::new());
        assert_eq!(eval_str(".a?", json!([1])), Vec::<Value>::new());
        assert!(run(&parse(".a").unwrap(), &json!([1])).is_err());
    }

    #[test]
    fn test_arithmetic_and_cartesian_order() {
        assert_eq!(eval_str("1 + 2 * 3", Value::Null), vec![json!(7)]);
        assert_eq!(
            eval_str("[(1,2) + (10,20)]", Value::Null),
            vec![json!([11, 12, 21, 22])]
        );
        assert_eq!(eval_str("10 / 4", Value::Null), vec![json!(2.5)]);
        assert_eq!(eval_str("7 % 3", Value::Null), vec![json!(1)]);
        assert_eq!(eval_str(r#""a,b" / ",""#, Value::Null), vec![json!(["a", "b"])]);
        assert_eq!(eval_str("[1,2,2,3] - [2]", Value::Null), vec![json!([1, 3])]);
        assert!(run(&parse("1 / 0").unwrap(), &Value::Null).is_err());
        assert!(run(&parse(r#"1 + "a""#).unwrap(), &Value::Null).is_err());
    }

    #[test]
    fn test_total_ordering() {
        assert_eq!(
            eval_str("[true, null, 1, \"a\", [], {}, false] | sort", Value::Null),
            vec![json!([null, false, true, 1, "a", [], {}])]
        );
        assert_eq!(eval_str("1 == 1.0", Value::Null), vec![json!(true)]);
        assert_eq!(eval_str(r#"{"a":1} < {"b":0}"#, Value::Null), vec![json!(true)]);
    }

    #[test]
    fn test_alternative_and_logic() {
        assert_eq!(eval_str(".a // 5", json!({})), vec![json!(5)]);
        assert_eq!(eval_str(".a // 5", json!({"a": false})), vec![json!(5)]);
        assert_eq!(eval_str(".a // 5", json!({"a": 1})), vec![json!(1)]);
        assert_eq!(eval_str("true and null", Value::Null), vec![json!(false)]);
        assert_eq!(eval_str("false or 1", Value::Null), vec![json!(true)]);
        assert_eq!(eval_str(". | not", json!(null)), vec![json!(true)]);
    }

    #[test]
    fn test_constructors_and_if() {
        let doc = json!({"a": 1, "b": "x", "k": "dyn"});
        assert_eq!(
            eval_str(r#"{a, c: .b, (.k): 2}"#, doc.clone()),
            vec![json!({"a": 1, "c": "x", "dyn": 2})]
        );
        assert_eq!(eval_str("[.a, .b]", doc.clone()), vec![json!([1, "x"])]);
        assert_eq!(
            eval_str(r#"if .a > 1 then "big" elif .a == 1 then "one" else "small" end"#, doc.clone()),
            vec![json!("one")]
        );
        assert_eq!(eval_str("if false then 1 end", doc.clone()), vec![doc]);
        assert_eq!(eval_str("{a: (1,2)}", Value::Null), vec![json!({"a": 1}), json!({"a": 2})]);
    }

    #[test]
    fn test_builtins() {
        let doc = json!({"name": "John", "tags": ["b", "a"], "n": [3, 1, 2]});
        assert_eq!(eval_str(".tags | length", doc.clone()), vec![json!(2)]);
        assert_eq!(eval_str("keys", doc.clone()), vec![json!(["n", "name", "tags"])]);
        assert_eq!(eval_str(r#"has("name")"#, doc.clone()), vec![json!(true)]);
        assert_eq!(eval_str(".n | map(. * 2)", doc.clone()), vec![json!([6, 2, 4])]);
        assert_eq!(eval_str(".n | add", doc.clone()), vec![json!(6)]);
        assert_eq!(eval_str(".n | min, max", doc.clone()), vec![json!(1), json!(3)]);
        assert_eq!(eval_str(".n | sort | reverse | first", doc.clone()), vec![json!(3)]);
        assert_eq!(eval_str(".tags | join(\"-\")", doc.clone()), vec![json!("b-a")]);
        assert_eq!(eval_str(".name | ascii_downcase", doc.clone()), vec![json!("john")]);
        assert_eq!(eval_str(r#".name | test("^j"; "i")"#, doc.clone()), vec![json!(true)]);
        assert_eq!(eval_str(r#".name | startswith("Jo")"#, doc.clone()), vec![json!(true)]);
        assert_eq!(eval_str(r#".tags | contains(["a"])"#, doc.clone()), vec![json!(true)]);
        assert_eq!(eval_str(".n | any(. > 2), all(. > 2)", doc.clone()), vec![json!(true), json!(false)]);
        assert_eq!(eval_str("first(.n[])", doc.clone()), vec![json!(3)]);
        assert_eq!(eval_str(r#""12" | tonumber"#, Value::Null), vec![json!(12)]);
        assert_eq!(eval_str("[1, null] | map(values)", Value::Null), vec![json!([1])]);
        assert_eq!(eval_str(".n | type", doc.clone()), vec![json!("array")]);
        assert_eq!(eval_str("1 | tostring", Value::Null), vec![json!("1")]);
        assert_eq!(
            eval_str("{a: 1} | to_entries", Value::Null),
            vec![json!([{"key": "a", "value": 1}])]
        );
        assert_eq!(
            eval_str("{a: 1, b: 0} | with_entries(select(.value > 0))", Value::Null),
            vec![json!({"a": 1})]
        );
    }

    #[test]
    fn test_runtime_errors() {
        assert!(run(&parse("true | length").unwrap(), &Value::Null).is_err());
        assert!(run(&parse(r#"error("boom")"#).unwrap(), &Value::Null).is_err());
        assert!(run(&parse("5 | keys").unwrap(), &Value::Null).is_err());
        assert!(run(&parse(r#""x" | tonumber"#).unwrap(), &Value::Null).is_err());
    }

    #[test]
    fn test_remainder_overflow_is_error() {
        let err = run(&parse("-9223372036854775808 % -1").unwrap(), &Value::Null).unwrap_err();
        assert!(!err.is_parse());
        assert_eq!(eval_str("-7 % 3", Value::Null), vec![json!(-1)]);
    }

    #[test]
    fn test_repeat_is_bounded() {
        assert!(run(&parse(r#""ab" * 1e19"#).unwrap(), &Value::Null).is_err());
        assert!(run(&parse(r#""x" * 1e12"#).unwrap(), &Value::Null).is_err());
        assert_eq!(eval_str(r#""ab" * 3"#, Value::Null), vec![json!("ababab")]);
        assert_eq!(eval_str(r#""ab" * 0"#, Value::Null), vec![Value::Null]);
    }
}
