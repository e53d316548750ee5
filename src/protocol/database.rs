//! Handle/protocol database (spec 4.4, component C5).
//!
//! Handles are arena indices disguised as pointers (spec 9 "Cyclic graphs":
//! "Represent handles as arena-allocated indices ... so removal is O(1)
//! and does not create dangling back-edges"); `OpenRef` never stores a
//! reference to another slot directly, only the `Handle`/`Guid` needed to
//! look one back up, so uninstalling one handle can never leave a dangling
//! pointer inside another.

use core::ffi::c_void;

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use log::debug;

use crate::error::{CoreError, ProtocolError, Result};
use crate::event::EventTimerCore;
use crate::tpl::TplScheduler;
use crate::uefi::base::{Event, Guid, Handle, Status};
use crate::uefi::table::boot::{
    OPEN_PROTOCOL_BY_CHILD_CONTROLLER, OPEN_PROTOCOL_BY_DRIVER, OPEN_PROTOCOL_EXCLUSIVE, OPEN_PROTOCOL_GET_PROTOCOL,
    OPEN_PROTOCOL_TEST_PROTOCOL, OpenProtocolInformationEntry,
};

#[derive(Debug, Copy, Clone)]
pub struct OpenRef {
    pub controller_handle: Option<Handle>,
    pub agent_handle: Option<Handle>,
    pub attributes: u32,
}

pub struct InterfaceRecord {
    pub guid: Guid,
    pub interface: *mut c_void,
    pub open_refs: Vec<OpenRef>,
}

struct HandleSlot {
    interfaces: Vec<InterfaceRecord>,
}

struct NotifyRegistration {
    guid: Guid,
    event: Event,
    pending: VecDeque<Handle>,
}

fn handle_index(h: Handle) -> Option<usize> {
    if h.is_null() { None } else { Some(h.as_ptr() as usize - 1) }
}

fn index_handle(idx: usize) -> Handle {
    Handle(((idx + 1) as *mut c_void) as *mut c_void)
}

pub struct ProtocolDatabase {
    handles: Vec<Option<HandleSlot>>,
    notify: Vec<NotifyRegistration>,
    next_registration: u64,
}

impl Default for ProtocolDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolDatabase {
    pub fn new() -> Self {
        ProtocolDatabase { handles: Vec::new(), notify: Vec::new(), next_registration: 1 }
    }

    fn slot(&self, handle: Handle) -> Result<&HandleSlot> {
        handle_index(handle)
            .and_then(|i| self.handles.get(i))
            .and_then(|s| s.as_ref())
            .ok_or(CoreError::Protocol(ProtocolError::NotFound))
    }

    fn slot_mut(&mut self, handle: Handle) -> Result<&mut HandleSlot> {
        handle_index(handle)
            .and_then(|i| self.handles.get_mut(i))
            .and_then(|s| s.as_mut())
            .ok_or(CoreError::Protocol(ProtocolError::NotFound))
    }

    fn queue_notify(&mut self, guid: Guid, handle: Handle, events: &mut EventTimerCore, tpl: &mut TplScheduler) {
        for reg in self.notify.iter_mut().filter(|r| r.guid == guid) {
            reg.pending.push_back(handle);
            let _ = events.signal(reg.event, tpl);
        }
    }

    /// `InstallProtocolInterface`. Creates `handle` if `None`.
    pub fn install(
        &mut self,
        handle: Option<Handle>,
        guid: Guid,
        interface: *mut c_void,
        events: &mut EventTimerCore,
        tpl: &mut TplScheduler,
    ) -> Result<Handle> {
        let handle = match handle {
            Some(h) if !h.is_null() => {
                self.slot(h)?;
                h
            }
            _ => {
                self.handles.push(Some(HandleSlot { interfaces: Vec::new() }));
                index_handle(self.handles.len() - 1)
            }
        };
        let slot = self.slot_mut(handle)?;
        if slot.interfaces.iter().any(|i| i.guid == guid) {
            return Err(CoreError::Protocol(ProtocolError::AlreadyInstalled));
        }
        slot.interfaces.push(InterfaceRecord { guid, interface, open_refs: Vec::new() });
        debug!("InstallProtocolInterface: {handle:?} {guid:?}");
        self.queue_notify(guid, handle, events, tpl);
        Ok(handle)
    }

    /// `ReinstallProtocolInterface`. Replaces the interface pointer
    /// in-place, preserving handle identity and existing open references.
    /// The caller (dispatcher) is responsible for re-driving driver
    /// binding afterwards in handle-open order (spec 9 open question a).
    pub fn reinstall(&mut self, handle: Handle, guid: Guid, new_interface: *mut c_void) -> Result<()> {
        let slot = self.slot_mut(handle)?;
        let rec = slot.interfaces.iter_mut().find(|i| i.guid == guid).ok_or(CoreError::Protocol(ProtocolError::NotFound))?;
        rec.interface = new_interface;
        Ok(())
    }

    /// `UninstallProtocolInterface`. Rejects while any `by_driver`,
    /// `exclusive`, or `by_child_controller` open ref remains.
    pub fn uninstall(&mut self, handle: Handle, guid: Guid) -> Result<()> {
        let slot = self.slot_mut(handle)?;
        let idx = slot.interfaces.iter().position(|i| i.guid == guid).ok_or(CoreError::Protocol(ProtocolError::NotFound))?;
        let blocking = slot.interfaces[idx].open_refs.iter().any(|r| {
            r.attributes & (OPEN_PROTOCOL_BY_DRIVER | OPEN_PROTOCOL_EXCLUSIVE | OPEN_PROTOCOL_BY_CHILD_CONTROLLER) != 0
        });
        if blocking {
            return Err(CoreError::Protocol(ProtocolError::HandleHasOpenReferences));
        }
        slot.interfaces.remove(idx);
        if slot.interfaces.is_empty() {
            if let Some(i) = handle_index(handle) {
                self.handles[i] = None;
            }
        }
        Ok(())
    }

    pub fn handle_protocol(&self, handle: Handle, guid: Guid) -> Result<*mut c_void> {
        let slot = self.slot(handle)?;
        slot.interfaces.iter().find(|i| i.guid == guid).map(|i| i.interface).ok_or(CoreError::Protocol(ProtocolError::NotFound))
    }

    /// `OpenProtocol` (spec 4.4 "OpenProtocol. Policy"). `evict` is called
    /// once per non-driver open that `by_driver|exclusive` must evict
    /// (the dispatcher wires this to `DisconnectController` on the
    /// interested controllers); if it returns an error the whole open
    /// fails and no state changes.
    pub fn open_protocol(
        &mut self,
        handle: Handle,
        guid: Guid,
        agent_handle: Handle,
        controller_handle: Handle,
        attributes: u32,
        mut evict: impl FnMut(Handle) -> Result<()>,
    ) -> Result<*mut c_void> {
        let by_driver = attributes & OPEN_PROTOCOL_BY_DRIVER != 0;
        let exclusive = attributes & OPEN_PROTOCOL_EXCLUSIVE != 0;
        let test = attributes & OPEN_PROTOCOL_TEST_PROTOCOL != 0;

        if by_driver && agent_handle.is_null() {
            return Err(CoreError::Status(Status::INVALID_PARAMETER));
        }

        let slot = self.slot_mut(handle)?;
        let rec = slot.interfaces.iter_mut().find(|i| i.guid == guid).ok_or(CoreError::Protocol(ProtocolError::NotFound))?;

        if test {
            return Ok(rec.interface);
        }

        if by_driver {
            if rec.open_refs.iter().any(|r| r.agent_handle == Some(agent_handle) && r.attributes & OPEN_PROTOCOL_BY_DRIVER != 0) {
                return Err(CoreError::Protocol(ProtocolError::AlreadyInstalled));
            }
            if exclusive {
                let evictees: Vec<Handle> = rec
                    .open_refs
                    .iter()
                    .filter(|r| r.attributes & OPEN_PROTOCOL_BY_DRIVER == 0)
                    .filter_map(|r| r.controller_handle)
                    .collect();
                for evictee in evictees {
                    evict(evictee)?;
                }
                let slot = self.slot_mut(handle)?;
                let rec = slot.interfaces.iter_mut().find(|i| i.guid == guid).ok_or(CoreError::Protocol(ProtocolError::NotFound))?;
                rec.open_refs.retain(|r| r.attributes & OPEN_PROTOCOL_BY_DRIVER != 0);
                rec.open_refs.push(OpenRef { controller_handle: Some(controller_handle), agent_handle: Some(agent_handle), attributes });
                return Ok(rec.interface);
            }
            rec.open_refs.push(OpenRef { controller_handle: Some(controller_handle), agent_handle: Some(agent_handle), attributes });
            return Ok(rec.interface);
        }

        if exclusive {
            let blocked = rec.open_refs.iter().any(|r| r.attributes & OPEN_PROTOCOL_BY_DRIVER != 0);
            if blocked {
                return Err(CoreError::Protocol(ProtocolError::ExclusiveConflict));
            }
        }

        rec.open_refs.push(OpenRef {
            controller_handle: if controller_handle.is_null() { None } else { Some(controller_handle) },
            agent_handle: if agent_handle.is_null() { None } else { Some(agent_handle) },
            attributes,
        });
        Ok(rec.interface)
    }

    /// `CloseProtocol`. Removes the first matching `OpenRef`.
    pub fn close_protocol(&mut self, handle: Handle, guid: Guid, agent_handle: Handle, controller_handle: Handle) -> Result<()> {
        let slot = self.slot_mut(handle)?;
        let rec = slot.interfaces.iter_mut().find(|i| i.guid == guid).ok_or(CoreError::Protocol(ProtocolError::NotFound))?;
        let pos = rec
            .open_refs
            .iter()
            .position(|r| r.agent_handle == Some(agent_handle) && (controller_handle.is_null() || r.controller_handle == Some(controller_handle)))
            .ok_or(CoreError::Protocol(ProtocolError::NotFound))?;
        rec.open_refs.remove(pos);
        Ok(())
    }

    pub fn open_protocol_information(&self, handle: Handle, guid: Guid) -> Result<Vec<OpenProtocolInformationEntry>> {
        let slot = self.slot(handle)?;
        let rec = slot.interfaces.iter().find(|i| i.guid == guid).ok_or(CoreError::Protocol(ProtocolError::NotFound))?;
        let mut by_agent: Vec<OpenProtocolInformationEntry> = Vec::new();
        for r in &rec.open_refs {
            let agent = r.agent_handle.unwrap_or(Handle::null());
            let controller = r.controller_handle.unwrap_or(Handle::null());
            if let Some(existing) = by_agent.iter_mut().find(|e| e.agent_handle == agent && e.controller_handle == controller && e.attributes == r.attributes) {
                existing.open_count += 1;
            } else {
                by_agent.push(OpenProtocolInformationEntry { agent_handle: agent, controller_handle: controller, attributes: r.attributes, open_count: 1 });
            }
        }
        Ok(by_agent)
    }

    pub fn protocols_per_handle(&self, handle: Handle) -> Result<Vec<Guid>> {
        let slot = self.slot(handle)?;
        Ok(slot.interfaces.iter().map(|i| i.guid).collect())
    }

    /// `LocateHandle(AllHandles, ..)` / `(ByProtocol, guid)`.
    pub fn locate_handles(&self, guid: Option<Guid>) -> Vec<Handle> {
        self.handles
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (i, s)))
            .filter(|(_, s)| guid.map(|g| s.interfaces.iter().any(|i| i.guid == g)).unwrap_or(true))
            .map(|(i, _)| index_handle(i))
            .collect()
    }

    /// `RegisterProtocolNotify`. Returns an opaque registration token for
    /// `LocateHandle(ByRegisterNotify, ...)`.
    pub fn register_protocol_notify(&mut self, guid: Guid, event: Event) -> u64 {
        let token = self.next_registration;
        self.next_registration += 1;
        self.notify.push(NotifyRegistration { guid, event, pending: VecDeque::new() });
        token
    }

    /// `LocateHandle(ByRegisterNotify, ...)`: the next handle queued for
    /// this registration's event since the caller last polled it.
    pub fn next_notified_handle(&mut self, event: Event) -> Option<Handle> {
        self.notify.iter_mut().find(|r| r.event == event).and_then(|r| r.pending.pop_front())
    }

    /// Children of `parent` recorded via `by_child_controller` opens
    /// (spec 4.4 "ConnectController ... recursion walks child handles
    /// reported by the child-controller OpenRefs").
    pub fn child_controllers(&self, parent: Handle) -> Vec<Handle> {
        let mut out = Vec::new();
        for (i, slot) in self.handles.iter().enumerate() {
            let Some(slot) = slot else { continue };
            let is_child = slot.interfaces.iter().any(|rec| {
                rec.open_refs.iter().any(|r| r.attributes & OPEN_PROTOCOL_BY_CHILD_CONTROLLER != 0 && r.controller_handle == Some(parent))
            });
            if is_child {
                out.push(index_handle(i));
            }
        }
        out
    }

    /// Children of `parent` created specifically by `agent`'s
    /// `by_child_controller` opens (spec 4.4 "call that driver's `Stop`
    /// with the enumerated child handles"). Used by `DisconnectController`
    /// so each agent's `Stop` only sees the children it created.
    pub fn child_controllers_for_agent(&self, parent: Handle, agent: Handle) -> Vec<Handle> {
        let mut out = Vec::new();
        for (i, slot) in self.handles.iter().enumerate() {
            let Some(slot) = slot else { continue };
            let is_child = slot.interfaces.iter().any(|rec| {
                rec.open_refs
                    .iter()
                    .any(|r| r.attributes & OPEN_PROTOCOL_BY_CHILD_CONTROLLER != 0 && r.controller_handle == Some(parent) && r.agent_handle == Some(agent))
            });
            if is_child {
                out.push(index_handle(i));
            }
        }
        out
    }

    /// `UninstallMultipleProtocolInterfaces`. Uninstalls every GUID on
    /// `handle` in order; if one fails partway, reinstalls the
    /// already-removed interfaces in reverse removal order before
    /// returning the error, so the handle is left exactly as it was found
    /// (spec 9 open question b). Reinstall re-queues protocol-notify
    /// events for those GUIDs, but since `install` only marks the event
    /// pending (the notify function itself runs later, once `RestoreTPL`
    /// drains that priority), no observer can run between the rollback
    /// and the original state being restored.
    pub fn uninstall_multiple(&mut self, handle: Handle, guids: &[Guid], events: &mut EventTimerCore, tpl: &mut TplScheduler) -> Result<()> {
        let mut removed: Vec<(Guid, *mut c_void)> = Vec::new();
        for &guid in guids {
            let interface = self.handle_protocol(handle, guid)?;
            match self.uninstall(handle, guid) {
                Ok(()) => removed.push((guid, interface)),
                Err(e) => {
                    for (guid, interface) in removed.into_iter().rev() {
                        let _ = self.install(Some(handle), guid, interface, events, tpl);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Every `by_driver`/`by_driver|exclusive` open on `controller` whose
    /// agent matches `agent` (or all, if `agent` is null) — used by
    /// `DisconnectController`.
    pub fn driver_opens_on(&self, controller: Handle, agent: Option<Handle>) -> Vec<(Guid, Handle)> {
        let mut out = Vec::new();
        if let Ok(slot) = self.slot(controller) {
            for rec in &slot.interfaces {
                for r in &rec.open_refs {
                    if r.attributes & OPEN_PROTOCOL_BY_DRIVER != 0 {
                        if let Some(a) = r.agent_handle {
                            if agent.is_none() || agent == Some(a) {
                                out.push((rec.guid, a));
                            }
                        }
                    }
                }
            }
        }
        out
    }
}
