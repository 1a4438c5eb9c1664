//! 安装器依赖图与安装顺序解析。
//!
//! 算法：
//! - 每次解析时按“名称 -> 下标”构建有向图，边由被依赖方指向依赖方
//! - Kahn 拓扑排序，就绪节点按声明下标最小优先出队，保证输出稳定可复现
//! - 排序结束后仍有剩余节点即说明存在环；从剩余节点中下标最小者出发沿依赖边行走，
//!   找到第一个重复节点，截取出精确的环路上报
//!
//! 约定：
//! - 悬空引用（依赖不存在的安装器）不构成边，由校验阶段单独报告
//! - 重名安装器只保留第一个的下标，重名同样由校验阶段报告
//!
//! 作者：应用打包工具项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use tracing::debug;

use crate::error::CycleError;
use crate::profile::Installer;

/// 以下标表示的依赖图（仅在单次解析内存在）。
#[derive(Debug)]
pub struct DependencyGraph<'a> {
    installers: &'a [Installer],
    /// `deps[i]`：安装器 i 依赖的安装器下标（去重，保持声明顺序）。
    deps: Vec<Vec<usize>>,
    /// `dependents[i]`：依赖安装器 i 的安装器下标。
    dependents: Vec<Vec<usize>>,
}

impl<'a> DependencyGraph<'a> {
    /// 根据安装器列表构建依赖图。
    pub fn build(installers: &'a [Installer]) -> Self {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(installers.len());
        for (i, installer) in installers.iter().enumerate() {
            index.entry(installer.name.as_str()).or_insert(i);
        }

        let mut deps = vec![Vec::new(); installers.len()];
        let mut dependents = vec![Vec::new(); installers.len()];
        for (i, installer) in installers.iter().enumerate() {
            for name in &installer.depends_on {
                let Some(&dep) = index.get(name.as_str()) else {
                    continue;
                };
                if !deps[i].contains(&dep) {
                    deps[i].push(dep);
                    dependents[dep].push(i);
                }
            }
        }

        Self {
            installers,
            deps,
            dependents,
        }
    }

    /// 计算安装顺序（下标序列）。
    ///
    /// 返回值：
    /// - `Ok(order)`：全部安装器的一个排列，被依赖方总在依赖方之前
    /// - `Err(cycle)`：存在环时返回环路上的下标（按依赖方向排列）
    pub fn topological_order(&self) -> Result<Vec<usize>, Vec<usize>> {
        let n = self.installers.len();
        let mut in_degree: Vec<usize> = self.deps.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(i)) = ready.pop() {
            order.push(i);
            for &dependent in &self.dependents[i] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() == n {
            return Ok(order);
        }
        Err(self.extract_cycle(&in_degree))
    }

    /// 从拓扑排序剩余节点中截取一个环。
    ///
    /// 剩余节点的入度都大于 0，且其未满足的依赖也都在剩余集合中，
    /// 因此沿依赖边行走一定会回到已访问节点。
    fn extract_cycle(&self, in_degree: &[usize]) -> Vec<usize> {
        let remaining = |i: usize| in_degree[i] > 0;
        let Some(start) = (0..in_degree.len()).find(|&i| remaining(i)) else {
            return Vec::new();
        };

        let mut position: HashMap<usize, usize> = HashMap::new();
        let mut path = Vec::new();
        let mut current = start;
        loop {
            if let Some(&at) = position.get(&current) {
                return path.split_off(at);
            }
            position.insert(current, path.len());
            path.push(current);
            match self.deps[current].iter().copied().find(|&d| remaining(d)) {
                Some(next) => current = next,
                None => return path,
            }
        }
    }

    /// 仅检测是否存在环（供校验阶段使用）。
    pub fn find_cycle(&self) -> Option<CycleError> {
        self.topological_order()
            .err()
            .map(|cycle| self.cycle_error(&cycle))
    }

    fn cycle_error(&self, cycle: &[usize]) -> CycleError {
        CycleError {
            cycle: cycle
                .iter()
                .map(|&i| self.installers[i].name.clone())
                .collect(),
        }
    }
}

/// 解析安装器的安装顺序。
///
/// 参数：
/// - `installers`：按声明顺序排列的安装器（应已通过校验）
///
/// 返回值：
/// - 成功：按安装顺序排列的安装器引用；无约束的安装器保持声明顺序
///
/// 异常处理：
/// - 存在循环依赖时返回 [`CycleError`]，其中包含精确的环路，不返回任何部分顺序
pub fn resolve_order(installers: &[Installer]) -> Result<Vec<&Installer>, CycleError> {
    let graph = DependencyGraph::build(installers);
    match graph.topological_order() {
        Ok(order) => {
            debug!(
                "安装顺序: {}",
                order
                    .iter()
                    .map(|&i| installers[i].name.as_str())
                    .collect::<Vec<_>>()
                    .join(" -> ")
            );
            Ok(order.into_iter().map(|i| &installers[i]).collect())
        }
        Err(cycle) => Err(graph.cycle_error(&cycle)),
    }
}
