//! # Hash Aggregation
//!
//! Consumes the whole input, groups rows by the tag set by GroupBy (a
//! single global group otherwise), and emits one row per group carrying
//! the aggregated fields, named by the aggregate's rendering (`COUNT(*)`,
//! `MIN(age)`, …). Groups emit in first-seen order.

use super::Stream;
use crate::document::{FieldBuffer, Value};
use crate::expr::{AggregateFunc, Environment, Expr};
use eyre::Result;
use hashbrown::HashMap;
use std::hash::{Hash, Hasher};

pub(crate) fn iterate(
    aggs: &[AggregateFunc],
    group_field: Option<&str>,
    stream: &Stream,
    i: usize,
    env: &Environment<'_>,
    f: &mut dyn FnMut(&Environment<'_>) -> Result<()>,
) -> Result<()> {
    let mut groups: Vec<(Value, Vec<Aggregator>)> = Vec::new();
    let mut lookup: HashMap<GroupKey, usize> = HashMap::new();

    stream.iter_input(i, env, &mut |e| {
        let key = e.group().cloned().unwrap_or(Value::Null);
        let idx = match lookup.get(&GroupKey(key.clone())) {
            Some(idx) => *idx,
            None => {
                groups.push((key.clone(), aggs.iter().map(Aggregator::new).collect()));
                lookup.insert(GroupKey(key), groups.len() - 1);
                groups.len() - 1
            }
        };
        for agg in &mut groups[idx].1 {
            agg.add(e)?;
        }
        Ok(())
    })?;

    // without grouping, an empty input still aggregates to one row
    if groups.is_empty() && group_field.is_none() {
        groups.push((Value::Null, aggs.iter().map(Aggregator::new).collect()));
    }

    for (key, states) in groups {
        let mut fb = FieldBuffer::new();
        if let Some(name) = group_field {
            fb.push(name, key);
        }
        for (spec, state) in aggs.iter().zip(states) {
            fb.push(spec.to_string(), state.finish());
        }
        let child = env.child().with_doc(&fb);
        f(&child)?;
    }
    Ok(())
}

/// Wraps a value for use as a hash key. Grouping uses structural
/// equality; doubles hash by bit pattern with negative zero normalized.
#[derive(Debug, Clone, PartialEq)]
struct GroupKey(Value);

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_value(&self.0, state);
    }
}

fn hash_value<H: Hasher>(v: &Value, state: &mut H) {
    std::mem::discriminant(v).hash(state);
    match v {
        Value::Null => {}
        Value::Bool(b) => b.hash(state),
        Value::Integer(i) => i.hash(state),
        Value::Double(d) => {
            let d = if *d == 0.0 { 0.0 } else { *d };
            d.to_bits().hash(state);
        }
        Value::Text(s) => s.hash(state),
        Value::Blob(b) => b.hash(state),
        Value::Array(a) => {
            for item in a.iter() {
                hash_value(item, state);
            }
        }
        Value::Document(d) => {
            for (name, value) in d.fields() {
                name.hash(state);
                hash_value(value, state);
            }
        }
    }
}

/// Running state of one aggregate over one group.
enum Aggregator {
    Count { expr: Option<Expr>, n: i64 },
    Min { expr: Expr, best: Option<Value> },
    Max { expr: Expr, best: Option<Value> },
    Sum { expr: Expr, acc: Option<Value> },
    Avg { expr: Expr, sum: f64, n: i64 },
}

impl Aggregator {
    fn new(spec: &AggregateFunc) -> Aggregator {
        match spec {
            AggregateFunc::Count(arg) => Aggregator::Count {
                expr: arg.as_deref().cloned(),
                n: 0,
            },
            AggregateFunc::Min(e) => Aggregator::Min {
                expr: (**e).clone(),
                best: None,
            },
            AggregateFunc::Max(e) => Aggregator::Max {
                expr: (**e).clone(),
                best: None,
            },
            AggregateFunc::Sum(e) => Aggregator::Sum {
                expr: (**e).clone(),
                acc: None,
            },
            AggregateFunc::Avg(e) => Aggregator::Avg {
                expr: (**e).clone(),
                sum: 0.0,
                n: 0,
            },
        }
    }

    fn add(&mut self, env: &Environment<'_>) -> Result<()> {
        match self {
            Aggregator::Count { expr, n } => match expr {
                None => *n += 1,
                Some(e) => {
                    if !e.eval(env)?.is_null() {
                        *n += 1;
                    }
                }
            },
            Aggregator::Min { expr, best } => {
                let v = expr.eval(env)?;
                if !v.is_null() {
                    let better = match best {
                        Some(b) => matches!(v.compare(b), Some(std::cmp::Ordering::Less)),
                        None => true,
                    };
                    if better {
                        *best = Some(v);
                    }
                }
            }
            Aggregator::Max { expr, best } => {
                let v = expr.eval(env)?;
                if !v.is_null() {
                    let better = match best {
                        Some(b) => matches!(v.compare(b), Some(std::cmp::Ordering::Greater)),
                        None => true,
                    };
                    if better {
                        *best = Some(v);
                    }
                }
            }
            Aggregator::Sum { expr, acc } => {
                let v = expr.eval(env)?;
                if matches!(v, Value::Integer(_) | Value::Double(_)) {
                    *acc = Some(match acc.take() {
                        Some(prev) => {
                            crate::expr::arithmetic::apply(crate::expr::ArithOp::Add, &prev, &v)
                        }
                        None => v,
                    });
                }
            }
            Aggregator::Avg { expr, sum, n } => match expr.eval(env)? {
                Value::Integer(i) => {
                    *sum += i as f64;
                    *n += 1;
                }
                Value::Double(d) => {
                    *sum += d;
                    *n += 1;
                }
                _ => {}
            },
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self {
            Aggregator::Count { n, .. } => Value::Integer(n),
            Aggregator::Min { best, .. } | Aggregator::Max { best, .. } => {
                best.unwrap_or(Value::Null)
            }
            Aggregator::Sum { acc, .. } => acc.unwrap_or(Value::Null),
            Aggregator::Avg { sum, n, .. } => {
                if n == 0 {
                    Value::Null
                } else {
                    Value::Double(sum / n as f64)
                }
            }
        }
    }
}
