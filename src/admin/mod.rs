//-
// Copyright (c) 2023, Jason Lingle
//
// This file is part of Postadm.
//
// Postadm is free software: you can  redistribute it and/or modify it under
// the terms of  the GNU General Public License as  published by the Free
// Software Foundation, either version 3 of  the License, or (at your option)
// any later version.
//
// Postadm is distributed  in the hope that it will  be useful, but WITHOUT
// ANY WARRANTY; without even the  implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along
// with Postadm. If not, see <http://www.gnu.org/licenses/>.

//! The administrative core: the account operation model, the endpoint
//! abstraction, the batch record processor, and the offboarding workflow.
//!
//! Nothing in this module touches the filesystem or the console directly;
//! all effects go through the [`endpoint::Endpoint`] and
//! [`endpoint::MailboxStore`] traits so that the processing logic can be
//! exercised against scripted stand-ins.

pub mod endpoint;
pub mod model;
pub mod offboard;
pub mod processor;
