use std::cmp::Ordering;
use tracing::warn;

use super::Task;
use crate::{SchedulerError, SchedulerResult};

/// 按名称索引、保持插入顺序的任务集合
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    /// 批量添加任务
    ///
    /// 遇到重名任务时返回 `Conflict`，在此之前的任务保持已添加状态。
    pub fn add<I>(&mut self, tasks: I) -> SchedulerResult<()>
    where
        I: IntoIterator<Item = Task>,
    {
        for task in tasks {
            if self.has(task.name()) {
                return Err(SchedulerError::Conflict(format!(
                    "任务 {} 已存在",
                    task.name()
                )));
            }
            self.tasks.push(task);
        }
        Ok(())
    }

    pub fn push(&mut self, task: Task) -> SchedulerResult<()> {
        self.add(std::iter::once(task))
    }

    pub fn has(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.name() == name)
    }

    /// 按名称挑选任务，保持当前列表中的顺序
    pub fn find_by_name<S: AsRef<str>>(&self, names: &[S]) -> TaskList {
        self.tasks
            .iter()
            .filter(|task| names.iter().any(|name| name.as_ref() == task.name()))
            .cloned()
            .collect()
    }

    /// 原地过滤，只保留满足条件的任务
    pub fn filter<F>(&mut self, mut predicate: F) -> &mut Self
    where
        F: FnMut(&Task) -> bool,
    {
        self.tasks.retain(|task| predicate(task));
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Task> {
        self.position(name).map(|index| self.tasks.remove(index))
    }

    /// 在原位置用新任务替换名为 `name` 的任务
    ///
    /// 新任务改名且新名称已被占用时返回 `Conflict`。
    pub fn replace(&mut self, name: &str, task: Task) -> SchedulerResult<Task> {
        let index = self
            .position(name)
            .ok_or_else(|| SchedulerError::not_found(name))?;
        if task.name() != name && self.has(task.name()) {
            return Err(SchedulerError::Conflict(format!(
                "任务 {} 已存在",
                task.name()
            )));
        }
        Ok(std::mem::replace(&mut self.tasks[index], task))
    }

    /// 稳定排序
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Task, &Task) -> Ordering,
    {
        self.tasks.sort_by(compare);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Task> {
        self.tasks.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.tasks.iter().map(|task| task.name().to_string()).collect()
    }

    /// 导出为 `(名称, 任务)` 列表或纯任务列表
    pub fn to_vec(&self, keep_keys: bool) -> Vec<(Option<String>, Task)> {
        self.tasks
            .iter()
            .map(|task| {
                let key = keep_keys.then(|| task.name().to_string());
                (key, task.clone())
            })
            .collect()
    }

    pub fn into_vec(self) -> Vec<Task> {
        self.tasks
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.tasks.iter().position(|task| task.name() == name)
    }
}

impl FromIterator<Task> for TaskList {
    /// 重名任务被跳过，保留先出现的那个
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        let mut list = TaskList::new();
        for task in iter {
            if list.has(task.name()) {
                warn!("忽略重复的任务: {}", task.name());
                continue;
            }
            list.tasks.push(task);
        }
        list
    }
}

impl IntoIterator for TaskList {
    type Item = Task;
    type IntoIter = std::vec::IntoIter<Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.into_iter()
    }
}

impl<'a> IntoIterator for &'a TaskList {
    type Item = &'a Task;
    type IntoIter = std::slice::Iter<'a, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.iter()
    }
}
