use candle_core::{Device, Tensor};
use kdam::{BarExt, tqdm};

use crate::{
    embedding_db::{EmbeddingDb, EmbeddingEntry, EmbeddingMatrix},
    error::{Error, Result},
    model_manager::Encoder,
};

/// Passages encoded per model call.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Encode `(passage_id, text)` pairs in batches and store their per-token
/// embeddings. Returns the number of passages stored.
pub fn embed_and_store<E: Encoder + ?Sized>(
    encoder: &mut E,
    db: &EmbeddingDb,
    passages: &[(u64, String)],
    batch_size: usize,
) -> Result<usize> {
    if passages.is_empty() {
        return Ok(0);
    }

    let mut pb = tqdm!(total = passages.len(), desc = "Encoding passages");
    let mut stored = 0;

    for batch in passages.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|(_, t)| t.clone()).collect();
        let embeddings = encoder.encode_documents(&texts)?;

        // [batch, tokens, dim]
        let (batch_len, _, dimension) = embeddings.dims3()?;
        if batch_len != batch.len() {
            return Err(Error::Model(format!(
                "encoder returned {batch_len} embeddings for {} passages",
                batch.len()
            )));
        }

        let mut entries = Vec::with_capacity(batch_len);
        for (i, (passage_id, _)) in batch.iter().enumerate() {
            let flat = embeddings.get(i)?.flatten_all()?.to_vec1::<f32>()?;
            let flat = trim_padding(flat, dimension);
            entries.push(EmbeddingEntry {
                passage_id: *passage_id,
                num_tokens: (flat.len() / dimension) as u32,
                dimension: dimension as u32,
                data: flat,
            });
        }
        db.store_batch(&entries)?;

        stored += batch_len;
        let _ = pb.update(batch_len);
    }
    let _ = pb.refresh();
    eprintln!();

    Ok(stored)
}

/// Drop trailing all-zero token rows left by batch padding, keeping at
/// least one row.
fn trim_padding(mut flat: Vec<f32>, dimension: usize) -> Vec<f32> {
    if dimension == 0 {
        return flat;
    }
    while flat.len() > dimension
        && flat[flat.len() - dimension..].iter().all(|v| *v == 0.0)
    {
        flat.truncate(flat.len() - dimension);
    }
    flat
}

/// Convert a stored matrix into a `[tokens, dim]` tensor.
pub fn matrix_to_tensor(matrix: &EmbeddingMatrix) -> Result<Tensor> {
    Ok(Tensor::from_slice(
        &matrix.data,
        (matrix.num_tokens as usize, matrix.dimension as usize),
        &Device::Cpu,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_manager::test_encoder::{DIM, WordHashEncoder};

    #[test]
    fn roundtrip_tensor_through_db() {
        let tmp = tempfile::tempdir().unwrap();
        let db = EmbeddingDb::open(&tmp.path().join("emb.redb")).unwrap();

        let data: Vec<f32> = (0..12).map(|i| i as f32).collect();
        db.store(42, 3, 4, &data).unwrap();

        let tensor = matrix_to_tensor(&db.load(42).unwrap().unwrap()).unwrap();
        assert_eq!(tensor.dims2().unwrap(), (3, 4));
        let flat: Vec<f32> = tensor.flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(flat, data);
    }

    #[test]
    fn trims_padding_rows() {
        let flat = vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(trim_padding(flat, 2), vec![1.0, 0.0, 0.0, 1.0]);
        assert_eq!(trim_padding(vec![0.0, 0.0], 2), vec![0.0, 0.0]);
    }

    #[test]
    fn embeds_in_batches() {
        let tmp = tempfile::tempdir().unwrap();
        let db = EmbeddingDb::open(&tmp.path().join("emb.redb")).unwrap();
        let passages: Vec<(u64, String)> = vec![
            (0, "short".to_string()),
            (1, "a much longer passage here".to_string()),
            (2, "two words".to_string()),
        ];

        let stored =
            embed_and_store(&mut WordHashEncoder, &db, &passages, 2).unwrap();
        assert_eq!(stored, 3);

        let short = db.load(0).unwrap().unwrap();
        assert_eq!(short.num_tokens, 1);
        assert_eq!(short.dimension as usize, DIM);
        assert_eq!(db.load(1).unwrap().unwrap().num_tokens, 5);
        assert_eq!(db.load(2).unwrap().unwrap().num_tokens, 2);
    }
}
