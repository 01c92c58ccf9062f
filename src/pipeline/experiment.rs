//! 日×ユーザーの評価ループ。
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info};

use super::cursor::DayCursor;
use crate::classification::{SparseVector, TfidfModel, Vocabulary};
use crate::classifier::{Backend, ClassifierError, Label};
use crate::config::Config;
use crate::corpus::{CorpusStore, UserId};
use crate::evaluation::{BinaryScore, DayScore, ExperimentReport, score_predictions};
use crate::sampling::{NegativeCandidate, Partition, ReselectionQueue, SampleSelector};

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("requested {requested} users but the event log only contains {available}")]
    TooManyUsers { requested: usize, available: usize },
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

/// 1日分の処理結果。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayStats {
    pub vocabulary_size: usize,
    pub unpruned_vocabulary_size: usize,
    pub users_scored: usize,
    pub users_skipped: usize,
    pub reselected: usize,
}

/// 実験の状態（ユーザーごとの再選択キュー）を保持して日ごとに評価を進める。
#[derive(Debug)]
pub struct ExperimentRunner<'a> {
    config: &'a Config,
    corpus: &'a CorpusStore,
    backend: Backend,
    queues: Vec<ReselectionQueue>,
}

impl<'a> ExperimentRunner<'a> {
    /// # Errors
    /// 要求ユーザー数がイベントログのユーザー数を超える場合。
    pub fn new(config: &'a Config, corpus: &'a CorpusStore) -> Result<Self, ExperimentError> {
        if config.num_users() > corpus.num_users() {
            return Err(ExperimentError::TooManyUsers {
                requested: config.num_users(),
                available: corpus.num_users(),
            });
        }
        Ok(Self {
            config,
            corpus,
            backend: config.backend(),
            queues: vec![ReselectionQueue::new(); config.num_users()],
        })
    }

    #[must_use]
    pub fn queue(&self, user_id: UserId) -> Option<&ReselectionQueue> {
        self.queues.get(user_id)
    }

    /// 全日程を評価する。
    ///
    /// # Errors
    /// 分類器の学習に失敗した場合。
    pub fn run<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<ExperimentReport, ExperimentError> {
        let mut report = ExperimentReport::new();
        let cursors = DayCursor::days(
            self.config.max_days(),
            self.config.earliest_timestamp(),
            self.config.seconds_per_day(),
        );
        for cursor in cursors {
            self.run_day(cursor, &mut report, rng)?;
        }
        Ok(report)
    }

    /// 語彙と TF-IDF を当日分で作り直し、全ユーザーを評価する。
    ///
    /// # Errors
    /// 分類器の学習に失敗した場合。
    pub fn run_day<R: Rng + ?Sized>(
        &mut self,
        cursor: DayCursor,
        report: &mut ExperimentReport,
        rng: &mut R,
    ) -> Result<DayStats, ExperimentError> {
        let vocabulary = Vocabulary::for_day(self.corpus, cursor.boundary);
        let tfidf = TfidfModel::for_day(self.corpus, &vocabulary, cursor.boundary);
        let selector = SampleSelector::new(self.corpus, &vocabulary);

        let mut stats = DayStats {
            vocabulary_size: vocabulary.len(),
            unpruned_vocabulary_size: vocabulary.unpruned_len(),
            ..DayStats::default()
        };

        for user_id in 0..self.config.num_users() {
            match self.evaluate_user(user_id, cursor, &selector, &tfidf, rng)? {
                Some((score, reselected)) => {
                    report.push(DayScore {
                        user_id,
                        day: cursor.day,
                        score,
                    });
                    stats.users_scored += 1;
                    stats.reselected += reselected;
                }
                None => stats.users_skipped += 1,
            }
        }

        info!(
            day = cursor.day,
            boundary = cursor.boundary,
            vocabulary = stats.vocabulary_size,
            vocabulary_unpruned = stats.unpruned_vocabulary_size,
            tfidf_docs = tfidf.num_docs(),
            users_scored = stats.users_scored,
            users_skipped = stats.users_skipped,
            reselected = stats.reselected,
            "day evaluated"
        );
        Ok(stats)
    }

    /// 採点できた場合はスコアと、再選択キューに新しく入った件数を返す。
    fn evaluate_user<R: Rng + ?Sized>(
        &mut self,
        user_id: UserId,
        cursor: DayCursor,
        selector: &SampleSelector<'_>,
        tfidf: &TfidfModel,
        rng: &mut R,
    ) -> Result<Option<(BinaryScore, usize)>, ExperimentError> {
        let training = selector.select(
            user_id,
            cursor.boundary,
            Partition::Training,
            Some(&self.queues[user_id]),
            rng,
        );
        if training.positives.is_empty() {
            debug!(user_id, day = cursor.day, "no training positives; skipped");
            return Ok(None);
        }
        let prediction = selector.select(user_id, cursor.boundary, Partition::Prediction, None, rng);
        if prediction.is_empty() {
            debug!(user_id, day = cursor.day, "nothing to predict; skipped");
            return Ok(None);
        }
        debug!(
            user_id,
            day = cursor.day,
            training_positives = training.positives.len(),
            training_negatives = training.negatives.len(),
            prediction_positives = prediction.positives.len(),
            prediction_negatives = prediction.negatives.len(),
            "samples selected"
        );

        let (vectors, labels) = self.training_batch(
            tfidf.transform_all(training.documents()),
            training.labels(),
        );
        let model = self.backend.train(vectors, &labels)?;

        let truth = prediction.labels();
        let predicted = model.predict(tfidf.transform_all(prediction.documents()));
        let score = score_predictions(&truth, &predicted.labels);

        let feedback_limit = cursor.next_boundary();
        let misclassified: Vec<NegativeCandidate> = prediction
            .chosen_negatives
            .iter()
            .zip(&predicted.labels[prediction.positives.len()..])
            .filter(|(candidate, label)| {
                **label == Label::Positive && candidate.timestamp <= feedback_limit
            })
            .map(|(candidate, _)| candidate.clone())
            .collect();
        let queue = &mut self.queues[user_id];
        let added = queue.extend(misclassified);
        if added > 0 {
            debug!(user_id, day = cursor.day, added, queue = queue.len(), "reselection queue grew");
        }

        Ok(Some((score, added)))
    }

    /// 設定に応じて空の学習ベクトルをラベルごと除く。
    fn training_batch(
        &self,
        vectors: Vec<SparseVector>,
        labels: Vec<Label>,
    ) -> (Vec<SparseVector>, Vec<Label>) {
        if !self.config.skip_empty_vectors() {
            return (vectors, labels);
        }
        vectors
            .into_iter()
            .zip(labels)
            .filter(|(vector, _)| !vector.is_empty())
            .unzip()
    }
}
