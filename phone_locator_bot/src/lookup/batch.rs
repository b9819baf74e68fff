use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use futures::future::join_all;

use crate::types::LookupResult;

/// Most numbers accepted in a single message.
pub const MAX_BATCH_SIZE: usize = 30;

const MIN_CONCURRENCY: usize = 3;
const MAX_CONCURRENCY: usize = 10;

/// In-flight lookups to allow for a batch of `count` numbers.
pub fn concurrency_for(count: usize) -> usize {
    (count / 3).clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
}

/// Run `lookup` over every number with bounded concurrency, returning
/// results in input order regardless of completion order. Workers pull
/// the next index from a shared cursor as they finish. `completed`
/// counts finished lookups for progress display.
pub async fn run_batch<F, Fut>(
    numbers: Vec<String>,
    completed: Arc<AtomicUsize>,
    lookup: F,
) -> Vec<LookupResult>
where
    F: Fn(String) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = LookupResult> + Send,
{
    let total = numbers.len();
    if total == 0 {
        return Vec::new();
    }

    let workers = concurrency_for(total).min(total);
    log::debug!("Processing {total} phone numbers with concurrency of {workers}");

    let numbers = Arc::new(numbers);
    let results: Arc<Mutex<Vec<Option<LookupResult>>>> = Arc::new(Mutex::new(vec![None; total]));
    let cursor = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let numbers = Arc::clone(&numbers);
        let results = Arc::clone(&results);
        let cursor = Arc::clone(&cursor);
        let completed = Arc::clone(&completed);
        let lookup = lookup.clone();

        handles.push(tokio::spawn(async move {
            loop {
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                if index >= numbers.len() {
                    break;
                }

                let result = lookup(numbers[index].clone()).await;
                results.lock().expect("result slots lock poisoned")[index] = Some(result);
                completed.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }

    for handle in join_all(handles).await {
        if let Err(e) = handle {
            // A worker died. Its claimed slots are filled in below.
            log::error!("Lookup worker crashed: {e}");
        }
    }

    let mut slots = results.lock().expect("result slots lock poisoned");
    slots
        .drain(..)
        .enumerate()
        .map(|(index, slot)| slot.unwrap_or_else(|| LookupResult::failed_item(&numbers[index])))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn results_come_back_in_input_order() {
        for total in 0..=MAX_BATCH_SIZE {
            let numbers: Vec<String> = (0..total).map(|i| format!("number-{i}")).collect();
            let completed = Arc::new(AtomicUsize::new(0));

            let results = run_batch(numbers, Arc::clone(&completed), |number| async move {
                // Finish out of order: earlier items take longer.
                let rank: u64 = number
                    .strip_prefix("number-")
                    .and_then(|n| n.parse().ok())
                    .unwrap();
                tokio::time::sleep(Duration::from_millis(100 - (rank % 7) * 10)).await;
                LookupResult::invalid(&number)
            })
            .await;

            assert_eq!(results.len(), total);
            assert_eq!(completed.load(Ordering::SeqCst), total);
            for (index, result) in results.iter().enumerate() {
                assert_eq!(result.input, format!("number-{index}"));
            }
        }
    }

    #[test]
    fn concurrency_scales_with_batch_size() {
        assert_eq!(concurrency_for(0), 3);
        assert_eq!(concurrency_for(1), 3);
        assert_eq!(concurrency_for(9), 3);
        assert_eq!(concurrency_for(15), 5);
        assert_eq!(concurrency_for(30), 10);
        assert_eq!(concurrency_for(1000), 10);
    }
}
