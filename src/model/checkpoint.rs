//! Checkpoint loading: safetensors → named `f32` arrays, with the key
//! normalisation quirks of training-framework exports.
//!
//! Exports may wrap every parameter under a `state_dict.` namespace, and
//! distributed training prepends `module.` to each name. Both are stripped
//! so checkpoints load into a model expecting bare parameter names.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::{ArrayD, IxDyn};
use safetensors::tensor::{Dtype, SafeTensors, TensorView};

/// Parameter name → tensor.
pub type StateDict = BTreeMap<String, ArrayD<f32>>;

/// Prefix added by data-parallel training wrappers.
pub const DISTRIBUTED_PREFIX: &str = "module.";

/// Namespace some exporters wrap the whole parameter set under.
pub const STATE_DICT_NAMESPACE: &str = "state_dict.";

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Read a safetensors checkpoint and normalise its keys.
pub fn load(path: &Path) -> Result<StateDict> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading checkpoint '{}'", path.display()))?;
    let tensors = SafeTensors::deserialize(&bytes)
        .with_context(|| format!("parsing checkpoint '{}'", path.display()))?;

    let mut state = StateDict::new();
    for (name, view) in tensors.tensors() {
        let array = tensor_to_array(&view)
            .with_context(|| format!("tensor '{}' in '{}'", name, path.display()))?;
        state.insert(name, array);
    }
    Ok(normalize_keys(state))
}

/// Strip the `state_dict.` namespace (only when every key carries it) and
/// the `module.` distributed-training prefix.
pub fn normalize_keys(state: StateDict) -> StateDict {
    let wrapped = !state.is_empty()
        && state.keys().all(|k| k.starts_with(STATE_DICT_NAMESPACE));

    state
        .into_iter()
        .map(|(key, tensor)| {
            let key = if wrapped {
                &key[STATE_DICT_NAMESPACE.len()..]
            } else {
                key.as_str()
            };
            let key = key.strip_prefix(DISTRIBUTED_PREFIX).unwrap_or(key);
            (key.to_string(), tensor)
        })
        .collect()
}

/// Verify the checkpoint's key set matches the model's expected parameter
/// set exactly, in both directions.
pub fn check_keys(expected: &[String], state: &StateDict) -> Result<()> {
    let expected: BTreeSet<&str> = expected.iter().map(String::as_str).collect();
    let present: BTreeSet<&str> = state.keys().map(String::as_str).collect();

    let missing: Vec<&&str> = expected.difference(&present).collect();
    let unexpected: Vec<&&str> = present.difference(&expected).collect();
    if !missing.is_empty() || !unexpected.is_empty() {
        bail!(
            "checkpoint keys do not match model parameters \
             (missing: {missing:?}, unexpected: {unexpected:?})"
        );
    }
    Ok(())
}

fn tensor_to_array(view: &TensorView<'_>) -> Result<ArrayD<f32>> {
    let shape = view.shape().to_vec();
    let data = view.data();

    // safetensors payloads are little-endian.
    let values: Vec<f32> = match view.dtype() {
        Dtype::F32 => data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        Dtype::F64 => data
            .chunks_exact(8)
            .map(|c| {
                f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f32
            })
            .collect(),
        other => bail!("unsupported tensor dtype {other:?}"),
    };

    ArrayD::from_shape_vec(IxDyn(&shape), values).context("tensor shape mismatch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ArrayD;

    fn serialize_state(entries: &[(&str, Vec<usize>, Vec<f32>)]) -> Vec<u8> {
        let buffers: Vec<(String, Vec<u8>)> = entries
            .iter()
            .map(|(name, _, values)| {
                let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
                (name.to_string(), bytes)
            })
            .collect();
        let views: Vec<(String, TensorView<'_>)> = entries
            .iter()
            .zip(buffers.iter())
            .map(|((name, shape, _), (_, bytes))| {
                (
                    name.to_string(),
                    TensorView::new(Dtype::F32, shape.clone(), bytes).unwrap(),
                )
            })
            .collect();
        safetensors::tensor::serialize(views, &None).unwrap()
    }

    fn tensor(v: f32) -> ArrayD<f32> {
        ArrayD::from_shape_vec(IxDyn(&[1]), vec![v]).unwrap()
    }

    #[test]
    fn module_prefix_is_stripped() {
        let mut state = StateDict::new();
        state.insert("module.stages.0.eta".into(), tensor(1.0));
        state.insert("stages.1.eta".into(), tensor(2.0));

        let normalized = normalize_keys(state);
        assert!(normalized.contains_key("stages.0.eta"));
        assert!(normalized.contains_key("stages.1.eta"));
    }

    #[test]
    fn state_dict_namespace_is_unwrapped_when_uniform() {
        let mut state = StateDict::new();
        state.insert("state_dict.module.w".into(), tensor(1.0));
        state.insert("state_dict.b".into(), tensor(2.0));

        let normalized = normalize_keys(state);
        let keys: Vec<&String> = normalized.keys().collect();
        assert_eq!(keys, vec!["b", "w"]);
    }

    #[test]
    fn state_dict_namespace_is_kept_when_partial() {
        // A genuine parameter that merely starts with the namespace string
        // must survive when the wrapping is not uniform.
        let mut state = StateDict::new();
        state.insert("state_dict.w".into(), tensor(1.0));
        state.insert("plain".into(), tensor(2.0));

        let normalized = normalize_keys(state);
        assert!(normalized.contains_key("state_dict.w"));
        assert!(normalized.contains_key("plain"));
    }

    #[test]
    fn check_keys_reports_both_directions() {
        let expected = vec!["a".to_string(), "b".to_string()];
        let mut state = StateDict::new();
        state.insert("a".into(), tensor(0.0));
        state.insert("c".into(), tensor(0.0));

        let err = check_keys(&expected, &state).unwrap_err().to_string();
        assert!(err.contains("\"b\""), "missing key should be listed: {err}");
        assert!(err.contains("\"c\""), "unexpected key should be listed: {err}");
    }

    #[test]
    fn load_round_trips_through_safetensors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckpt.safetensors");
        let bytes = serialize_state(&[
            ("module.w", vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]),
            ("module.b", vec![2], vec![0.5, -0.5]),
        ]);
        std::fs::write(&path, bytes).unwrap();

        let state = load(&path).unwrap();
        assert_eq!(state.len(), 2);
        let w = &state["w"];
        assert_eq!(w.shape(), &[2, 2]);
        assert_eq!(w[[1, 0]], 3.0);
        assert_eq!(state["b"][[1]], -0.5);
    }
}
