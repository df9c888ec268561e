use std::collections::HashMap;

use serde_json::Value;

use crate::key::MatchKey;
use crate::model::{AggregatedB, Record};
use crate::normalize::{parse_amount, QualityLog};

/// Group ledger lines by key, sum `sum_fields`, keep the first non-null
/// value of every other field. Groups come out in order of first appearance.
pub fn aggregate_records<'a, I>(rows: I, sum_fields: &[String], log: &mut QualityLog) -> Vec<AggregatedB>
where
    I: IntoIterator<Item = (&'a MatchKey, &'a Record)>,
{
    let mut index: HashMap<MatchKey, usize> = HashMap::new();
    let mut groups: Vec<(MatchKey, Record, Vec<f64>, usize)> = Vec::new();

    for (key, record) in rows {
        let slot = match index.get(key) {
            Some(&i) => i,
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key.clone(), Record::new(), vec![0.0; sum_fields.len()], 0));
                groups.len() - 1
            }
        };
        let (_, merged, sums, count) = &mut groups[slot];

        for (i, field) in sum_fields.iter().enumerate() {
            sums[i] += parse_amount(record.get(field), field, log);
        }
        for (name, value) in record.fields() {
            let unset = matches!(merged.get(name), None | Some(Value::Null));
            if unset {
                merged.insert(name.clone(), value.clone());
            }
        }
        *count += 1;
    }

    groups
        .into_iter()
        .map(|(key, mut record, sums, line_count)| {
            for (field, total) in sum_fields.iter().zip(sums) {
                record.insert(field.clone(), total);
            }
            AggregatedB {
                key,
                record,
                line_count,
            }
        })
        .collect()
}
