use crate::errors::CameraNotReady;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionStatus {
    #[default]
    NotDetermined,
    Granted,
    Denied,
    /// Denied permanently; only the system settings can change it.
    Blocked,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        self == PermissionStatus::Granted
    }

    /// Capture needs camera and microphone; the weaker of the two wins.
    pub fn combine(self, other: PermissionStatus) -> PermissionStatus {
        use PermissionStatus::*;
        match (self, other) {
            (Granted, Granted) => Granted,
            (Blocked, _) | (_, Blocked) => Blocked,
            (Denied, _) | (_, Denied) => Denied,
            _ => NotDetermined,
        }
    }
}

/// Camera readiness as last reported by the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionGate {
    device_ready: bool,
    permission: PermissionStatus,
}

impl PermissionGate {
    pub fn set_device_ready(&mut self, ready: bool) {
        self.device_ready = ready;
    }

    pub fn set_permission(&mut self, permission: PermissionStatus) {
        self.permission = permission;
    }

    pub fn device_ready(&self) -> bool {
        self.device_ready
    }

    pub fn permission(&self) -> PermissionStatus {
        self.permission
    }

    pub fn check(&self) -> Result<(), CameraNotReady> {
        if !self.device_ready {
            return Err(CameraNotReady::NoDevice);
        }
        if !self.permission.is_granted() {
            return Err(CameraNotReady::PermissionMissing);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PermissionStatus::*;

    #[test]
    fn combine_requires_both() {
        assert_eq!(Granted.combine(Granted), Granted);
        assert_eq!(Granted.combine(Denied), Denied);
        assert_eq!(Denied.combine(Blocked), Blocked);
        assert_eq!(NotDetermined.combine(Granted), NotDetermined);
    }

    #[test]
    fn gate_checks_device_before_permission() {
        let mut gate = PermissionGate::default();
        assert_eq!(gate.check(), Err(CameraNotReady::NoDevice));

        gate.set_device_ready(true);
        assert_eq!(gate.check(), Err(CameraNotReady::PermissionMissing));

        gate.set_permission(Granted);
        assert_eq!(gate.check(), Ok(()));

        gate.set_permission(Blocked);
        assert_eq!(gate.check(), Err(CameraNotReady::PermissionMissing));
    }
}
