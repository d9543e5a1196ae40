// 该文件是 Zhilu （指路） 项目的一部分。
// src/action.rs - 交通标志到驾驶指令的映射
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::fmt;

pub const STOP_LABEL: &str = "Stop";
pub const TURN_LEFT_LABEL: &str = "Turn left ahead";
pub const TURN_RIGHT_LABEL: &str = "Turn right ahead";

/// 执行器可以接受的四种指令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
  Stop,
  TurnLeft,
  TurnRight,
  Forward,
}

impl Command {
  /// 由标志名称得到指令，未知标志一律直行
  pub fn from_label(label: &str) -> Self {
    match label {
      STOP_LABEL => Command::Stop,
      TURN_LEFT_LABEL => Command::TurnLeft,
      TURN_RIGHT_LABEL => Command::TurnRight,
      _ => Command::Forward,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Command::Stop => "stop",
      Command::TurnLeft => "left",
      Command::TurnRight => "right",
      Command::Forward => "forward",
    }
  }
}

impl fmt::Display for Command {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn known_signs_map_to_their_commands() {
    assert_eq!(Command::from_label("Stop"), Command::Stop);
    assert_eq!(Command::from_label("Turn left ahead"), Command::TurnLeft);
    assert_eq!(Command::from_label("Turn right ahead"), Command::TurnRight);
  }

  #[test]
  fn everything_else_goes_forward() {
    for label in ["", "stop", "Speed limit (30km/h)", "Turn left ahead ", "Yield"] {
      assert_eq!(Command::from_label(label), Command::Forward, "{label:?}");
    }
  }

  #[test]
  fn display_uses_actuator_names() {
    assert_eq!(Command::TurnLeft.to_string(), "left");
    assert_eq!(Command::Forward.to_string(), "forward");
  }
}
