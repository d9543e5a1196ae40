// 该文件是 Zhilu （指路） 项目的一部分。
// src/actuator.rs - 执行器
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

//! # 执行器
//!
//! 四个动作：停车、左转、右转、前进。调用是“发出即忘”的，
//! 执行器不反馈动作是否完成。

use std::{
  fs::{File, OpenOptions},
  io::Write,
  path::PathBuf,
};

use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, action::Command};

pub trait Actuator {
  type Error;

  fn stop(&mut self) -> Result<(), Self::Error>;
  fn left(&mut self) -> Result<(), Self::Error>;
  fn right(&mut self) -> Result<(), Self::Error>;
  fn forward(&mut self) -> Result<(), Self::Error>;

  fn execute(&mut self, command: Command) -> Result<(), Self::Error> {
    match command {
      Command::Stop => self.stop(),
      Command::TurnLeft => self.left(),
      Command::TurnRight => self.right(),
      Command::Forward => self.forward(),
    }
  }

  /// 执行命令；失败时补发一次 `stop`，返回原始错误
  fn execute_or_stop(&mut self, command: Command) -> Result<(), Self::Error> {
    let result = self.execute(command);
    if result.is_err() && command != Command::Stop && self.stop().is_err() {
      error!("执行 {} 失败后停车指令也失败", command);
    }
    result
  }
}

impl<A: Actuator + ?Sized> Actuator for &mut A {
  type Error = A::Error;

  fn stop(&mut self) -> Result<(), Self::Error> {
    (**self).stop()
  }

  fn left(&mut self) -> Result<(), Self::Error> {
    (**self).left()
  }

  fn right(&mut self) -> Result<(), Self::Error> {
    (**self).right()
  }

  fn forward(&mut self) -> Result<(), Self::Error> {
    (**self).forward()
  }

  fn execute(&mut self, command: Command) -> Result<(), Self::Error> {
    (**self).execute(command)
  }
}

/// 只记录命令，不驱动硬件
#[derive(Debug, Default)]
pub struct LogActuator {
  issued: u64,
}

impl FromUrlWithScheme for LogActuator {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogActuator {
  type Error = ActuatorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ActuatorError::SchemeMismatch(url.scheme().to_string()));
    }
    Ok(LogActuator::default())
  }
}

impl LogActuator {
  pub fn issued(&self) -> u64 {
    self.issued
  }

  fn log(&mut self, command: Command) -> Result<(), std::convert::Infallible> {
    self.issued += 1;
    info!("执行器命令: {}", command);
    Ok(())
  }
}

impl Actuator for LogActuator {
  type Error = std::convert::Infallible;

  fn stop(&mut self) -> Result<(), Self::Error> {
    self.log(Command::Stop)
  }

  fn left(&mut self) -> Result<(), Self::Error> {
    self.log(Command::TurnLeft)
  }

  fn right(&mut self) -> Result<(), Self::Error> {
    self.log(Command::TurnRight)
  }

  fn forward(&mut self) -> Result<(), Self::Error> {
    self.log(Command::Forward)
  }
}

#[derive(Error, Debug)]
pub enum DeviceActuatorError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error on {path}: {source}")]
  IoError {
    path: PathBuf,
    source: std::io::Error,
  },
}

/// 向串口设备（或普通文件）逐行写入命令字：`stop`、`left`、`right`、`forward`
pub struct DeviceActuator {
  path: PathBuf,
  device: File,
}

impl FromUrlWithScheme for DeviceActuator {
  const SCHEME: &'static str = "device";
}

impl FromUrl for DeviceActuator {
  type Error = DeviceActuatorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DeviceActuatorError::SchemaMismatch);
    }
    Self::open(PathBuf::from(url.path()))
  }
}

impl DeviceActuator {
  pub fn open(path: PathBuf) -> Result<Self, DeviceActuatorError> {
    info!("打开执行器设备: {}", path.display());
    let device = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&path)
      .map_err(|source| DeviceActuatorError::IoError {
        path: path.clone(),
        source,
      })?;
    Ok(DeviceActuator { path, device })
  }

  fn send(&mut self, command: Command) -> Result<(), DeviceActuatorError> {
    writeln!(self.device, "{}", command)
      .and_then(|_| self.device.flush())
      .map_err(|source| DeviceActuatorError::IoError {
        path: self.path.clone(),
        source,
      })
  }
}

impl Actuator for DeviceActuator {
  type Error = DeviceActuatorError;

  fn stop(&mut self) -> Result<(), Self::Error> {
    self.send(Command::Stop)
  }

  fn left(&mut self) -> Result<(), Self::Error> {
    self.send(Command::TurnLeft)
  }

  fn right(&mut self) -> Result<(), Self::Error> {
    self.send(Command::TurnRight)
  }

  fn forward(&mut self) -> Result<(), Self::Error> {
    self.send(Command::Forward)
  }
}

#[derive(Error, Debug)]
pub enum ActuatorError {
  #[error("设备执行器错误: {0}")]
  DeviceActuatorError(#[from] DeviceActuatorError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum ActuatorWrapper {
  Log(LogActuator),
  Device(DeviceActuator),
}

impl FromUrl for ActuatorWrapper {
  type Error = ActuatorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LogActuator::SCHEME => Ok(ActuatorWrapper::Log(LogActuator::from_url(url)?)),
      DeviceActuator::SCHEME => Ok(ActuatorWrapper::Device(DeviceActuator::from_url(url)?)),
      other => Err(ActuatorError::SchemeMismatch(other.to_string())),
    }
  }
}

impl ActuatorWrapper {
  pub fn kind(&self) -> &'static str {
    match self {
      ActuatorWrapper::Log(_) => "log",
      ActuatorWrapper::Device(_) => "device",
    }
  }
}

impl Actuator for ActuatorWrapper {
  type Error = ActuatorError;

  fn stop(&mut self) -> Result<(), Self::Error> {
    self.execute(Command::Stop)
  }

  fn left(&mut self) -> Result<(), Self::Error> {
    self.execute(Command::TurnLeft)
  }

  fn right(&mut self) -> Result<(), Self::Error> {
    self.execute(Command::TurnRight)
  }

  fn forward(&mut self) -> Result<(), Self::Error> {
    self.execute(Command::Forward)
  }

  fn execute(&mut self, command: Command) -> Result<(), Self::Error> {
    match self {
      ActuatorWrapper::Log(actuator) => actuator.execute(command).map_err(|e| match e {}),
      ActuatorWrapper::Device(actuator) => Ok(actuator.execute(command)?),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Default)]
  struct Flaky {
    calls: Vec<Command>,
    fail_on: Option<Command>,
  }

  impl Actuator for Flaky {
    type Error = String;

    fn stop(&mut self) -> Result<(), Self::Error> {
      self.execute(Command::Stop)
    }
    fn left(&mut self) -> Result<(), Self::Error> {
      self.execute(Command::TurnLeft)
    }
    fn right(&mut self) -> Result<(), Self::Error> {
      self.execute(Command::TurnRight)
    }
    fn forward(&mut self) -> Result<(), Self::Error> {
      self.execute(Command::Forward)
    }

    fn execute(&mut self, command: Command) -> Result<(), Self::Error> {
      self.calls.push(command);
      if self.fail_on == Some(command) {
        return Err(format!("{} jammed", command));
      }
      Ok(())
    }
  }

  #[test]
  fn failure_is_followed_by_stop() {
    let mut actuator = Flaky {
      fail_on: Some(Command::TurnLeft),
      ..Default::default()
    };
    assert!(actuator.execute_or_stop(Command::TurnLeft).is_err());
    assert_eq!(actuator.calls, [Command::TurnLeft, Command::Stop]);
  }

  #[test]
  fn success_issues_single_command() {
    let mut actuator = Flaky::default();
    actuator.execute_or_stop(Command::Forward).unwrap();
    assert_eq!(actuator.calls, [Command::Forward]);
  }

  #[test]
  fn failed_stop_is_not_repeated() {
    let mut actuator = Flaky {
      fail_on: Some(Command::Stop),
      ..Default::default()
    };
    assert!(actuator.execute_or_stop(Command::Stop).is_err());
    assert_eq!(actuator.calls, [Command::Stop]);
  }

  #[test]
  fn log_actuator_counts_commands() {
    fn turn<A: Actuator>(mut actuator: A) {
      let _ = actuator.right();
    }

    let mut actuator = LogActuator::default();
    let _ = actuator.execute(Command::Stop);
    turn(&mut actuator);
    assert_eq!(actuator.issued(), 2);
  }

  #[test]
  fn device_actuator_writes_one_word_per_line() {
    let path = std::env::temp_dir().join(format!("zhilu-device-{}", std::process::id()));
    let _ = std::fs::remove_file(&path);

    let url = Url::parse(&format!("device://{}", path.display())).unwrap();
    let mut actuator = ActuatorWrapper::from_url(&url).unwrap();
    assert_eq!(actuator.kind(), "device");
    actuator.left().unwrap();
    actuator.execute(Command::Forward).unwrap();
    actuator.stop().unwrap();
    drop(actuator);

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "left\nforward\nstop\n");
    std::fs::remove_file(&path).unwrap();
  }

  #[test]
  fn unknown_actuator_scheme_is_rejected() {
    let url = Url::parse("can://bus0").unwrap();
    assert!(matches!(
      ActuatorWrapper::from_url(&url),
      Err(ActuatorError::SchemeMismatch(s)) if s == "can"
    ));
  }
}
