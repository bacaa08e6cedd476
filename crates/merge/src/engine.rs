// Archivo: engine.rs
// Propósito: el planner que convierte un registro en intents de mutación
// según la `MergePolicy`. No hace I/O y no guarda estado.
use crate::domain::{IntentTarget, MergePolicy, MutationIntent};
use crate::flatten::flatten;
use rayon::prelude::*;
use sync_domain::{strip_nulls, DomainError, Record, Value, ID_FIELD};

/// Calcula los intents de un registro.
///
/// Con `merge = true` cada campo aplanado produce exactamente un intent:
/// - null -> `Remove`
/// - lista -> `AppendUnique` sin los elementos vacíos (se emite aunque quede
///   vacía)
/// - escalar -> `Replace`
///
/// Con `merge = false` se emite un único `ReplaceDocument` con el registro
/// completo, sin los campos null salvo que `keep_none` lo indique.
///
/// Devuelve `DomainError::InvalidRecord` si falta la shard key configurada.
pub fn plan(record: &Record, policy: &MergePolicy) -> Result<Vec<MutationIntent>, DomainError> {
    let shard = match &policy.shard_key {
        Some(path) => Some(record.shard_key(path)?),
        None => None,
    };
    let target = IntentTarget { id: record.id().clone(),
                                shard };

    if !policy.merge {
        let document = if policy.keep_none {
            record.fields().clone()
        } else {
            strip_nulls(record.fields())
        };
        return Ok(vec![MutationIntent::ReplaceDocument { target, document }]);
    }

    let intents = flatten(record.fields()).into_iter()
                                          .filter(|f| f.path != ID_FIELD)
                                          .map(|f| match f.value {
                                              Value::Null => MutationIntent::Remove { target: target.clone(),
                                                                                      path: f.path },
                                              Value::List(items) => {
                                                  let values = items.into_iter().filter(|v| !v.is_falsy()).collect();
                                                  MutationIntent::AppendUnique { target: target.clone(),
                                                                                 path: f.path,
                                                                                 values }
                                              }
                                              value => MutationIntent::Replace { target: target.clone(),
                                                                                 path: f.path,
                                                                                 value },
                                          })
                                          .collect();
    Ok(intents)
}

/// Planifica todos los registros de un tick en paralelo y concatena los
/// intents respetando el orden de entrada. Falla con el primer registro
/// inválido.
pub fn plan_batch(records: &[Record], policy: &MergePolicy) -> Result<Vec<MutationIntent>, DomainError> {
    let per_record: Vec<Vec<MutationIntent>> = records.par_iter()
                                                      .map(|r| plan(r, policy))
                                                      .collect::<Result<_, _>>()?;
    Ok(per_record.into_iter().flatten().collect())
}

/// Envoltorio con la política fijada; útil para inyectar el planner en
/// jobs que siempre usan la misma configuración.
#[derive(Debug, Clone, Default)]
pub struct MergePlanner {
    policy: MergePolicy,
}

impl MergePlanner {
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MergePolicy {
        &self.policy
    }

    pub fn plan(&self, record: &Record) -> Result<Vec<MutationIntent>, DomainError> {
        plan(record, &self.policy)
    }

    pub fn plan_batch(&self, records: &[Record]) -> Result<Vec<MutationIntent>, DomainError> {
        plan_batch(records, &self.policy)
    }
}
