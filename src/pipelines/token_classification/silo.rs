use std::{path::Path, sync::Arc};

use anyhow::Context;
use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::{Dataset as _, InMemDataset},
    },
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::datasets::{
    conll::{Dataset, Sentence},
    LoadableDataset,
};

use super::{
    batcher::{Batcher, Train},
    processor::{Feature, Processor},
};

/// The training split file name inside a data directory
pub static TRAIN_FILE: &str = "train.txt";

/// The development split file name inside a data directory
pub static DEV_FILE: &str = "dev.txt";

/// The test split file name inside a data directory
pub static TEST_FILE: &str = "test.txt";

/// Number of worker threads preparing evaluation batches. Training batches are prepared on the
/// calling thread so their order follows the shuffle seed and their count is `n_batches`.
const NUM_WORKERS: usize = 4;

/// Featurized train, dev and test splits
#[derive(Debug, Clone)]
pub struct DataSilo {
    /// Training features
    pub train: Vec<Feature>,

    /// Development features, from `dev.txt` or held out from train
    pub dev: Option<Vec<Feature>>,

    /// Test features
    pub test: Option<Vec<Feature>>,
}

/// Descriptive statistics for one split
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitStats {
    /// Number of sequences
    pub sequences: usize,

    /// Mean number of tokens per sequence, special tokens included
    pub mean_length: f64,

    /// Longest sequence
    pub max_length: usize,

    /// Sequences that reached the maximum sequence length
    pub clipped: usize,
}

/// Data loaders over the splits of a [`DataSilo`]. Evaluation splits run on the inner backend.
pub struct Loaders<B: AutodiffBackend> {
    /// Shuffled training batches
    pub train: Arc<dyn DataLoader<Train<B>>>,

    /// Development batches
    pub dev: Option<Arc<dyn DataLoader<Train<B::InnerBackend>>>>,

    /// Test batches
    pub test: Option<Arc<dyn DataLoader<Train<B::InnerBackend>>>>,

    /// Number of training batches per epoch
    pub n_batches: usize,
}

impl DataSilo {
    /// Read and featurize the splits in a data directory. `train.txt` is required. When
    /// `dev.txt` is missing, a `dev_split` fraction of the training sentences is held out.
    pub async fn load(
        processor: &Processor,
        data_dir: &Path,
        dev_split: f64,
        seed: u64,
    ) -> anyhow::Result<Self> {
        check_data_dir(data_dir)?;

        let delimiter = processor.config().delimiter.clone();

        let train_sentences = read_split(&data_dir.join(TRAIN_FILE), &delimiter)
            .await?
            .ok_or_else(|| anyhow!("Training file {:?} not found", data_dir.join(TRAIN_FILE)))?;

        let (train_sentences, dev_sentences) =
            match read_split(&data_dir.join(DEV_FILE), &delimiter).await? {
                Some(dev) => (train_sentences, Some(dev)),
                None if dev_split > 0.0 => {
                    let (train, dev) = split_off_dev(train_sentences, dev_split, seed)?;
                    info!(
                        "No {} found, holding out {} training sentences for evaluation",
                        DEV_FILE,
                        dev.len()
                    );
                    (train, Some(dev))
                }
                None => (train_sentences, None),
            };

        let test_sentences = read_split(&data_dir.join(TEST_FILE), &delimiter).await?;

        let silo = Self {
            train: featurize(processor, &train_sentences, TRAIN_FILE)?,
            dev: dev_sentences
                .map(|sentences| featurize(processor, &sentences, DEV_FILE))
                .transpose()?,
            test: test_sentences
                .map(|sentences| featurize(processor, &sentences, TEST_FILE))
                .transpose()?,
        };

        if silo.train.is_empty() {
            return Err(anyhow!("Training file {:?} has no sentences", data_dir.join(TRAIN_FILE)));
        }

        silo.log_stats(processor.max_seq_len());

        Ok(silo)
    }

    /// Statistics for the training split
    pub fn stats(features: &[Feature], max_seq_len: usize) -> SplitStats {
        if features.is_empty() {
            return SplitStats::default();
        }

        let lengths: Vec<usize> = features.iter().map(|f| f.token_ids.len()).collect();

        SplitStats {
            sequences: lengths.len(),
            mean_length: lengths.iter().sum::<usize>() as f64 / lengths.len() as f64,
            max_length: lengths.iter().copied().max().unwrap_or_default(),
            clipped: lengths.iter().filter(|&&len| len >= max_seq_len).count(),
        }
    }

    fn log_stats(&self, max_seq_len: usize) {
        let splits = [
            ("train", Some(&self.train)),
            ("dev", self.dev.as_ref()),
            ("test", self.test.as_ref()),
        ];

        for (name, features) in splits {
            match features {
                Some(features) => {
                    let stats = Self::stats(features, max_seq_len);
                    info!(
                        "{}: {} sequences, mean length {:.1}, max length {}, {} clipped at {}",
                        name,
                        stats.sequences,
                        stats.mean_length,
                        stats.max_length,
                        stats.clipped,
                        max_seq_len
                    );
                }
                None => info!("{}: not available", name),
            }
        }
    }

    /// Build data loaders for every split. Training batches are shuffled with the given seed.
    pub fn loaders<B: AutodiffBackend>(
        &self,
        processor: &Processor,
        device: &B::Device,
        batch_size: usize,
        seed: u64,
    ) -> Loaders<B> {
        let pad_token_id = processor.pad_token_id();
        let pad_label_id = processor.labels().pad_id();
        let max_seq_len = processor.max_seq_len();

        let batcher_train =
            Batcher::<B>::new(pad_token_id, pad_label_id, max_seq_len, device.clone());
        let batcher_eval = Batcher::<B::InnerBackend>::new(
            pad_token_id,
            pad_label_id,
            max_seq_len,
            device.clone(),
        );

        let train_dataset = InMemDataset::new(self.train.clone());
        let n_batches = train_dataset.len().div_ceil(batch_size.max(1));

        let train = DataLoaderBuilder::new(batcher_train)
            .batch_size(batch_size)
            .shuffle(seed)
            .build(train_dataset);

        let eval_loader = |features: &Vec<Feature>| {
            DataLoaderBuilder::new(batcher_eval.clone())
                .batch_size(batch_size)
                .num_workers(NUM_WORKERS)
                .build(InMemDataset::new(features.clone()))
        };

        Loaders {
            train,
            dev: self.dev.as_ref().map(eval_loader),
            test: self.test.as_ref().map(eval_loader),
            n_batches,
        }
    }
}

/// Fail early unless `data_dir` is a directory holding a training file
pub fn check_data_dir(data_dir: &Path) -> anyhow::Result<()> {
    if !data_dir.is_dir() {
        return Err(anyhow!("Data directory {:?} does not exist", data_dir));
    }

    let train_file = data_dir.join(TRAIN_FILE);
    if !train_file.is_file() {
        return Err(anyhow!("Training file {:?} not found", train_file));
    }

    Ok(())
}

/// Read a split file, or `None` when it does not exist
async fn read_split(path: &Path, delimiter: &str) -> anyhow::Result<Option<Vec<Sentence>>> {
    if !path.exists() {
        return Ok(None);
    }

    let dataset = Dataset::load(path, delimiter).await?;

    Ok(Some(dataset.iter().collect()))
}

fn featurize(
    processor: &Processor,
    sentences: &[Sentence],
    split: &str,
) -> anyhow::Result<Vec<Feature>> {
    sentences
        .iter()
        .enumerate()
        .map(|(i, sentence)| {
            processor
                .featurize(sentence)
                .with_context(|| format!("Unable to featurize sentence {} of {}", i + 1, split))
        })
        .collect()
}

/// Shuffle with a seeded RNG and hold out a fraction of the sentences
pub fn split_off_dev(
    mut sentences: Vec<Sentence>,
    dev_split: f64,
    seed: u64,
) -> anyhow::Result<(Vec<Sentence>, Vec<Sentence>)> {
    if !(0.0..1.0).contains(&dev_split) {
        return Err(anyhow!("dev_split must be in [0, 1), got {}", dev_split));
    }

    let n_dev = (sentences.len() as f64 * dev_split).round() as usize;

    if n_dev == 0 || n_dev >= sentences.len() {
        return Err(anyhow!(
            "dev_split {} leaves no sentences for one of the splits of {}",
            dev_split,
            sentences.len()
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    sentences.shuffle(&mut rng);

    let dev = sentences.split_off(sentences.len() - n_dev);

    Ok((sentences, dev))
}

#[cfg(test)]
mod tests {
    use burn::backend::{Autodiff, NdArray};
    use pretty_assertions::assert_eq;

    use crate::testing;

    use super::*;

    static TRAIN: &str = "-DOCSTART- -X- O O\n\nMartin B-PER\nspielt O\nHandball O\n\nMüller B-PER\nspielt O\nin O\nBerlin B-LOC\n\nMartin B-PER\nspielt O\n";

    static TEST: &str = "Müller B-PER\nspielt O\n";

    fn sentences(n: usize) -> Vec<Sentence> {
        (0..n)
            .map(|i| Sentence::new(vec![format!("w{i}")], vec!["O".to_string()]))
            .collect()
    }

    #[tokio::test]
    async fn test_load_holds_out_dev_from_train() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join(TRAIN_FILE), TRAIN)?;
        std::fs::write(dir.path().join(TEST_FILE), TEST)?;

        let processor = testing::processor(128);
        let silo = DataSilo::load(&processor, dir.path(), 0.34, 42).await?;

        assert_eq!(silo.train.len(), 2);
        assert_eq!(silo.dev.as_ref().map(Vec::len), Some(1));
        assert_eq!(silo.test.as_ref().map(Vec::len), Some(1));

        Ok(())
    }

    #[tokio::test]
    async fn test_load_without_dev() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join(TRAIN_FILE), TRAIN)?;

        let processor = testing::processor(128);
        let silo = DataSilo::load(&processor, dir.path(), 0.0, 42).await?;

        assert_eq!(silo.train.len(), 3);
        assert!(silo.dev.is_none());
        assert!(silo.test.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_load_requires_train_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join(TEST_FILE), TEST)?;

        let processor = testing::processor(128);
        let result = DataSilo::load(&processor, dir.path(), 0.0, 42).await;

        assert!(result.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_load_rejects_unknown_tags() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join(TRAIN_FILE), "Martin B-PERSON\n")?;

        let processor = testing::processor(128);
        let result = DataSilo::load(&processor, dir.path(), 0.0, 42).await;

        assert!(result.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_train_loader_yields_n_batches() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join(TRAIN_FILE), format!("{TRAIN}\n").repeat(4))?;

        let processor = testing::processor(128);
        let silo = DataSilo::load(&processor, dir.path(), 0.0, 42).await?;

        assert_eq!(silo.train.len(), 12);

        let device = Default::default();
        let loaders = silo.loaders::<Autodiff<NdArray>>(&processor, &device, 5, 42);

        let sizes: Vec<usize> = loaders
            .train
            .iter()
            .map(|batch| batch.targets.dims()[0])
            .collect();

        assert_eq!(loaders.n_batches, 3);
        assert_eq!(sizes, vec![5, 5, 2]);

        Ok(())
    }

    #[tokio::test]
    async fn test_train_batches_follow_the_seed() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join(TRAIN_FILE), format!("{TRAIN}\n").repeat(3))?;

        let processor = testing::processor(128);
        let silo = DataSilo::load(&processor, dir.path(), 0.0, 42).await?;

        let device = Default::default();
        let order = |seed: u64| -> Vec<Vec<i64>> {
            silo.loaders::<Autodiff<NdArray>>(&processor, &device, 2, seed)
                .train
                .iter()
                .map(|batch| batch.input.tokens.into_data().convert::<i64>().value)
                .collect()
        };

        assert_eq!(order(7), order(7));

        Ok(())
    }

    #[test]
    fn test_check_data_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;

        assert!(check_data_dir(&dir.path().join("missing")).is_err());
        assert!(check_data_dir(dir.path()).is_err());

        std::fs::write(dir.path().join(TRAIN_FILE), TRAIN)?;
        check_data_dir(dir.path())?;

        Ok(())
    }

    #[test]
    fn test_split_off_dev_is_seeded() -> anyhow::Result<()> {
        let (train_a, dev_a) = split_off_dev(sentences(10), 0.2, 7)?;
        let (train_b, dev_b) = split_off_dev(sentences(10), 0.2, 7)?;

        assert_eq!(train_a.len(), 8);
        assert_eq!(dev_a.len(), 2);
        assert_eq!(train_a, train_b);
        assert_eq!(dev_a, dev_b);

        Ok(())
    }

    #[test]
    fn test_split_off_dev_rejects_empty_splits() {
        assert!(split_off_dev(sentences(2), 0.1, 7).is_err());
        assert!(split_off_dev(sentences(10), 1.0, 7).is_err());
    }

    #[test]
    fn test_stats() {
        let features = vec![
            Feature::new(vec![2, 4, 3], vec![6, 1, 6]),
            Feature::new(vec![2, 4, 6, 3], vec![6, 1, 0, 6]),
        ];

        let stats = DataSilo::stats(&features, 4);

        assert_eq!(
            stats,
            SplitStats {
                sequences: 2,
                mean_length: 3.5,
                max_length: 4,
                clipped: 1,
            }
        );
    }
}
