use std::collections::VecDeque;
use std::sync::{mpsc, Mutex};
use std::thread;

/// A labeled unit of pack work and its result.
pub struct Task<T> {
    pub label: String,
    pub run: Box<dyn FnOnce() -> T + Send>,
}

impl<T> Task<T> {
    pub fn new(label: impl Into<String>, run: impl FnOnce() -> T + Send + 'static) -> Self {
        Task {
            label: label.into(),
            run: Box::new(run),
        }
    }
}

pub struct TaskOutcome<T> {
    pub label: String,
    pub result: T,
}

/// Run tasks across up to `workers` threads and collect every outcome.
/// Tasks are independent; completion order is not the submission order.
pub fn run_tasks<T: Send + 'static>(workers: usize, tasks: Vec<Task<T>>) -> Vec<TaskOutcome<T>> {
    if tasks.is_empty() {
        return Vec::new();
    }
    let worker_count = workers.max(1).min(tasks.len());
    if worker_count == 1 {
        return tasks
            .into_iter()
            .map(|task| TaskOutcome {
                label: task.label,
                result: (task.run)(),
            })
            .collect();
    }

    let task_count = tasks.len();
    let queue = Mutex::new(tasks.into_iter().collect::<VecDeque<Task<T>>>());
    let (sender, receiver) = mpsc::channel::<TaskOutcome<T>>();

    thread::scope(|scope| {
        for _ in 0..worker_count {
            let queue = &queue;
            let sender = sender.clone();
            scope.spawn(move || loop {
                let task = {
                    let mut guard = match queue.lock() {
                        Ok(guard) => guard,
                        Err(_) => return,
                    };
                    guard.pop_front()
                };
                let Some(task) = task else {
                    return;
                };
                let outcome = TaskOutcome {
                    label: task.label,
                    result: (task.run)(),
                };
                if sender.send(outcome).is_err() {
                    return;
                }
            });
        }
        drop(sender);
    });

    receiver.iter().take(task_count).collect()
}

pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn all_tasks_complete() {
        let tasks: Vec<Task<usize>> = (0..16)
            .map(|i| Task::new(format!("task{}", i), move || i * 2))
            .collect();
        let outcomes = run_tasks(4, tasks);
        assert_eq!(outcomes.len(), 16);
        let labels: HashSet<String> = outcomes.iter().map(|o| o.label.clone()).collect();
        assert_eq!(labels.len(), 16);
        for outcome in &outcomes {
            let index: usize = outcome.label.trim_start_matches("task").parse().unwrap();
            assert_eq!(outcome.result, index * 2);
        }
    }

    #[test]
    fn single_worker_runs_in_order() {
        let tasks: Vec<Task<usize>> = (0..4).map(|i| Task::new(format!("t{}", i), move || i)).collect();
        let outcomes = run_tasks(1, tasks);
        let results: Vec<usize> = outcomes.iter().map(|o| o.result).collect();
        assert_eq!(results, vec![0, 1, 2, 3]);
    }

    #[test]
    fn empty_task_list_is_fine() {
        let outcomes: Vec<TaskOutcome<()>> = run_tasks(8, Vec::new());
        assert!(outcomes.is_empty());
    }
}
